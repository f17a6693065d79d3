//! The six lesson stages.
//!
//! Each stage is a `(name, executor, fallback)` row. The orchestrator drives
//! the table in order and swaps in the fallback whenever an executor errors,
//! so every response carries all six stages.

use std::fmt;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::content::{self, ChallengeQuestion, Scenario};
use super::context::LessonContext;
use super::scoring::{analyze_answer, CategoryScores};
use crate::artifact::{fallback_artifact, timed_out_artifact, ArtifactEngine, ArtifactResult};
use crate::error::{Error, Result};
use crate::lesson::Difficulty;
use crate::voice::{Intent, RenderContext, ResponseEngine};

// ─────────────────────────────────────────────────────────────────
// Stage names
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ScoreReview,
    TopicAnnouncement,
    Explanation,
    PersonalizedExample,
    ChallengeQuestion,
    Artifact,
}

impl StageName {
    pub const ALL: [StageName; 6] = [
        StageName::ScoreReview,
        StageName::TopicAnnouncement,
        StageName::Explanation,
        StageName::PersonalizedExample,
        StageName::ChallengeQuestion,
        StageName::Artifact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::ScoreReview => "score_review",
            StageName::TopicAnnouncement => "topic_announcement",
            StageName::Explanation => "explanation",
            StageName::PersonalizedExample => "personalized_example",
            StageName::ChallengeQuestion => "challenge_question",
            StageName::Artifact => "artifact",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Stage payloads
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReview {
    pub score: f32,
    /// Absent when the analysis did not run
    pub categories: Option<CategoryScores>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub feedback: String,
    pub encouragement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicAnnouncement {
    pub greeting: String,
    pub announcement: String,
    pub context: String,
    pub objectives: Vec<String>,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub introduction: String,
    pub explanation: String,
    pub pro_tip: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalizedExample {
    pub example: String,
    pub characters: Vec<String>,
    pub scenario: Option<Scenario>,
    pub analogies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactStage {
    pub intro: String,
    pub artifact: ArtifactResult,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StagePayload {
    ScoreReview(ScoreReview),
    TopicAnnouncement(TopicAnnouncement),
    Explanation(Explanation),
    PersonalizedExample(PersonalizedExample),
    ChallengeQuestion(ChallengeQuestion),
    Artifact(ArtifactStage),
}

impl StagePayload {
    /// Score carried by a score review
    pub fn score(&self) -> Option<f32> {
        match self {
            StagePayload::ScoreReview(review) => Some(review.score),
            _ => None,
        }
    }

    pub fn artifact(&self) -> Option<&ArtifactResult> {
        match self {
            StagePayload::Artifact(stage) => Some(&stage.artifact),
            _ => None,
        }
    }
}

/// A stage's payload and whether it came from the fallback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    pub fallback: bool,
    pub payload: StagePayload,
}

impl StageOutcome {
    pub fn completed(payload: StagePayload) -> Self {
        Self {
            fallback: false,
            payload,
        }
    }

    pub fn fallback(payload: StagePayload) -> Self {
        Self {
            fallback: true,
            payload,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Stage table
// ─────────────────────────────────────────────────────────────────

/// What a stage may read while it runs
#[derive(Clone, Copy)]
pub struct StageEnv<'a> {
    pub ctx: &'a LessonContext,
    pub voice: &'a ResponseEngine,
    pub artifacts: &'a ArtifactEngine,
    pub artifacts_enabled: bool,
    /// How long the artifact stage waits for generation
    pub artifact_timeout: Duration,
    pub neutral_score: f32,
}

impl StageEnv<'_> {
    fn render(&self, intent: Intent, score: Option<f32>) -> String {
        let mut render_ctx = RenderContext::new(self.ctx.lesson_number(), self.ctx.topic())
            .with_persona(self.ctx.instructor_name());
        if let Some(score) = score {
            render_ctx = render_ctx.with_score(score);
        }
        self.voice.render(intent, &render_ctx)
    }
}

pub type StageFuture<'a> = BoxFuture<'a, Result<StagePayload>>;
pub type StageExecutor = for<'a> fn(StageEnv<'a>) -> StageFuture<'a>;
pub type StageFallback = fn(&StageEnv<'_>) -> StagePayload;

#[derive(Clone, Copy)]
pub struct Stage {
    pub name: StageName,
    pub run: StageExecutor,
    pub fallback: StageFallback,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}

pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage {
            name: StageName::ScoreReview,
            run: score_review,
            fallback: score_review_fallback,
        },
        Stage {
            name: StageName::TopicAnnouncement,
            run: topic_announcement,
            fallback: topic_announcement_fallback,
        },
        Stage {
            name: StageName::Explanation,
            run: explanation,
            fallback: explanation_fallback,
        },
        Stage {
            name: StageName::PersonalizedExample,
            run: personalized_example,
            fallback: personalized_example_fallback,
        },
        Stage {
            name: StageName::ChallengeQuestion,
            run: challenge_question,
            fallback: challenge_question_fallback,
        },
        Stage {
            name: StageName::Artifact,
            run: artifact,
            fallback: artifact_fallback,
        },
    ]
}

// ─────────────────────────────────────────────────────────────────
// Executors
// ─────────────────────────────────────────────────────────────────

fn score_review(env: StageEnv<'_>) -> StageFuture<'_> {
    Box::pin(async move {
        let analysis = analyze_answer(&env.ctx.user_answer, &env.ctx.meta);
        debug!(
            lesson = env.ctx.lesson_number(),
            score = analysis.score,
            matched = analysis.matched_keywords.len(),
            "Answer analysed"
        );

        Ok(StagePayload::ScoreReview(ScoreReview {
            score: analysis.score,
            categories: Some(analysis.categories),
            feedback: env.render(Intent::ScoreFeedback, Some(analysis.score)),
            encouragement: env.render(Intent::Encouragement, Some(analysis.score)),
            strengths: analysis.strengths,
            improvements: analysis.improvements,
        }))
    })
}

fn topic_announcement(env: StageEnv<'_>) -> StageFuture<'_> {
    Box::pin(async move {
        let meta = &env.ctx.meta;
        let objectives = if meta.objectives.is_empty() {
            vec![format!("Understand the essentials of {}", meta.topic)]
        } else {
            meta.objectives.clone()
        };

        Ok(StagePayload::TopicAnnouncement(TopicAnnouncement {
            greeting: env.render(Intent::Greeting, None),
            announcement: env.render(Intent::LessonIntro, None),
            context: content::topic_context(meta),
            objectives,
            difficulty: meta.difficulty,
        }))
    })
}

fn explanation(env: StageEnv<'_>) -> StageFuture<'_> {
    Box::pin(async move {
        let meta = &env.ctx.meta;
        Ok(StagePayload::Explanation(Explanation {
            introduction: env.render(Intent::Explanation, None),
            explanation: content::explanation(meta),
            pro_tip: content::pro_tip(meta),
            key_points: content::key_points(meta),
        }))
    })
}

fn personalized_example(env: StageEnv<'_>) -> StageFuture<'_> {
    Box::pin(async move {
        let ctx = env.ctx;
        let (instructor, student) = match (ctx.instructor(), ctx.supporting()) {
            (Some(instructor), Some(student)) => (instructor, student),
            _ => {
                return Err(Error::stage_failed(
                    StageName::PersonalizedExample,
                    format!("cast has {} member(s), need two", ctx.cast.len()),
                ))
            }
        };

        Ok(StagePayload::PersonalizedExample(PersonalizedExample {
            example: content::example(&ctx.meta, student),
            characters: vec![instructor.name.clone(), student.name.clone()],
            scenario: Some(content::scenario(&ctx.meta, instructor, student)),
            analogies: content::analogies(),
        }))
    })
}

fn challenge_question(env: StageEnv<'_>) -> StageFuture<'_> {
    Box::pin(async move {
        Ok(StagePayload::ChallengeQuestion(content::challenge_question(&env.ctx.meta)))
    })
}

fn artifact(env: StageEnv<'_>) -> StageFuture<'_> {
    Box::pin(async move {
        let ctx = env.ctx;
        let intro = env.render(Intent::ArtifactIntro, None);
        let started = Instant::now();

        let artifact = if !env.artifacts_enabled {
            fallback_artifact(&ctx.meta, &ctx.cast)
        } else {
            match tokio::time::timeout(
                env.artifact_timeout,
                env.artifacts.get_or_generate(&ctx.meta, &ctx.cast),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        lesson = ctx.lesson_number(),
                        timeout_ms = env.artifact_timeout.as_millis() as u64,
                        "Stopped waiting for artifact, generation continues in background"
                    );
                    timed_out_artifact(&ctx.meta, &ctx.cast)
                }
            }
        };

        Ok(StagePayload::Artifact(ArtifactStage {
            intro,
            artifact,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }))
    })
}

// ─────────────────────────────────────────────────────────────────
// Fallbacks
// ─────────────────────────────────────────────────────────────────

fn score_review_fallback(env: &StageEnv<'_>) -> StagePayload {
    StagePayload::ScoreReview(ScoreReview {
        score: env.neutral_score,
        categories: None,
        strengths: vec!["Completed the lesson".to_string()],
        improvements: vec!["Continue practicing".to_string()],
        feedback: "Your answer shows understanding. Continue practicing.".to_string(),
        encouragement: "Keep going. Each lesson builds on the last.".to_string(),
    })
}

fn topic_announcement_fallback(env: &StageEnv<'_>) -> StagePayload {
    let meta = &env.ctx.meta;
    StagePayload::TopicAnnouncement(TopicAnnouncement {
        greeting: format!("Welcome to lesson {}.", meta.number),
        announcement: content::default_announcement(meta),
        context: content::topic_context(meta),
        objectives: meta.objectives.clone(),
        difficulty: meta.difficulty,
    })
}

fn explanation_fallback(env: &StageEnv<'_>) -> StagePayload {
    let meta = &env.ctx.meta;
    StagePayload::Explanation(Explanation {
        introduction: String::new(),
        explanation: format!("Let us work through the core ideas of {}.", meta.topic),
        pro_tip: content::pro_tip(meta),
        key_points: content::key_points(meta),
    })
}

fn personalized_example_fallback(env: &StageEnv<'_>) -> StagePayload {
    let ctx = env.ctx;
    StagePayload::PersonalizedExample(PersonalizedExample {
        example: format!("Consider how {} applies to your own projects.", ctx.topic()),
        characters: ctx.cast.iter().map(|p| p.name.clone()).collect(),
        scenario: None,
        analogies: Vec::new(),
    })
}

fn challenge_question_fallback(env: &StageEnv<'_>) -> StagePayload {
    StagePayload::ChallengeQuestion(content::fallback_question(&env.ctx.meta))
}

fn artifact_fallback(env: &StageEnv<'_>) -> StagePayload {
    StagePayload::Artifact(ArtifactStage {
        intro: String::new(),
        artifact: fallback_artifact(&env.ctx.meta, &env.ctx.cast),
        elapsed_ms: 0,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::artifact::{MemoryStore, MockImageProvider, SharedProvider};
    use crate::config::{ArtifactSettings, VoiceSettings};
    use crate::lesson::LessonMeta;
    use crate::persona::{Persona, PersonaRole};
    use crate::random::SeededRandom;
    use crate::voice::TemplateBook;

    struct Fixture {
        ctx: LessonContext,
        voice: ResponseEngine,
        artifacts: ArtifactEngine,
    }

    impl Fixture {
        fn new(cast: Vec<Persona>, artifacts: ArtifactEngine) -> Self {
            let meta = LessonMeta::new(3, "CFG Scale and Its Impact on Generation")
                .with_keywords(["CFG scale", "Guidance"]);
            Self {
                ctx: LessonContext::new(meta, "Higher cfg means more guidance, because it weights the prompt", cast),
                voice: ResponseEngine::new(
                    Arc::new(TemplateBook::bundled().unwrap()),
                    &VoiceSettings::default(),
                    SeededRandom::shared(Some(3)),
                ),
                artifacts,
            }
        }

        fn env(&self, timeout: Duration) -> StageEnv<'_> {
            StageEnv {
                ctx: &self.ctx,
                voice: &self.voice,
                artifacts: &self.artifacts,
                artifacts_enabled: true,
                artifact_timeout: timeout,
                neutral_score: 7.0,
            }
        }
    }

    fn cast() -> Vec<Persona> {
        vec![
            Persona::new("Hale", PersonaRole::Instructor, 100),
            Persona::new("Pip", PersonaRole::RotatingSupport, 12),
        ]
    }

    fn no_provider() -> ArtifactEngine {
        ArtifactEngine::new(None, Arc::new(MemoryStore::new(8)), &ArtifactSettings::default())
    }

    #[test]
    fn test_table_order_matches_names() {
        let names: Vec<_> = default_stages().iter().map(|s| s.name).collect();
        assert_eq!(names, StageName::ALL.to_vec());
    }

    #[test]
    fn test_stage_name_serde() {
        let json = serde_json::to_string(&StageName::PersonalizedExample).unwrap();
        assert_eq!(json, "\"personalized_example\"");
    }

    #[tokio::test]
    async fn test_every_stage_runs_with_full_cast() {
        let fixture = Fixture::new(cast(), no_provider());
        let env = fixture.env(Duration::from_secs(1));
        for stage in default_stages() {
            let payload = (stage.run)(env).await;
            assert!(payload.is_ok(), "{} failed", stage.name);
        }
    }

    #[tokio::test]
    async fn test_example_stage_needs_supporting_persona() {
        let fixture = Fixture::new(cast()[..1].to_vec(), no_provider());
        let err = personalized_example(fixture.env(Duration::from_secs(1))).await.unwrap_err();
        assert!(err.to_string().contains("personalized_example"));
    }

    #[tokio::test]
    async fn test_score_fallback_uses_neutral_score() {
        let fixture = Fixture::new(cast(), no_provider());
        let payload = score_review_fallback(&fixture.env(Duration::from_secs(1)));
        assert_eq!(payload.score(), Some(7.0));
    }

    #[tokio::test]
    async fn test_artifact_stage_times_out_with_panels() {
        let provider = Arc::new(MockImageProvider::hanging()) as SharedProvider;
        let engine = ArtifactEngine::new(Some(provider), Arc::new(MemoryStore::new(8)), &ArtifactSettings::default());
        let fixture = Fixture::new(cast(), engine);

        let payload = artifact(fixture.env(Duration::from_millis(30))).await.unwrap();
        let result = payload.artifact().unwrap();
        assert!(result.timed_out);
        assert!(result.fallback_used);
        assert_eq!(result.payload.panels().len(), 4);
    }
}
