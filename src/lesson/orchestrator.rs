//! Lesson orchestrator
//!
//! Turns one learner submission into a complete six-stage lesson response.
//! Nothing that goes wrong while producing a lesson reaches the caller:
//! failed or panicking stages are replaced by their fallbacks, and a lesson
//! that cannot be looked up at all yields a single fallback response.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::context::LessonContext;
use super::curriculum::{CurriculumProvider, LessonMeta, Phase, StaticCurriculum};
use super::progress::{NoProgress, ProgressStore};
use super::stages::{default_stages, Stage, StageEnv, StageExecutor, StageName, StageOutcome};
use crate::artifact::{create_provider, create_store, ArtifactEngine, ArtifactStats};
use crate::config::{TutorConfig, TutorSettings};
use crate::error::{Error, Result};
use crate::persona::{PersonaPool, RotationSelector};
use crate::random::SeededRandom;
use crate::voice::{Intent, RenderContext, ResponseEngine, TemplateBook, VoiceStats};

/// Topic shown when the lesson could not be looked up
const UNKNOWN_TOPIC: &str = "Educational Content";

// ─────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LessonResponse {
    pub lesson_number: u32,
    pub topic: String,
    pub phase: Phase,
    /// 1-10, one decimal
    pub score: f32,
    /// Always all six stages, in execution order
    pub stages: IndexMap<StageName, StageOutcome>,
    pub summary: String,
    /// Set when the whole lesson had to be replaced
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LessonResponse {
    pub fn stage(&self, name: StageName) -> Option<&StageOutcome> {
        self.stages.get(&name)
    }

    /// Names of stages that fell back
    pub fn fallback_stages(&self) -> Vec<StageName> {
        self.stages
            .iter()
            .filter(|(_, outcome)| outcome.fallback)
            .map(|(name, _)| *name)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub lessons_completed: u64,
    pub fallback_responses: u64,
    pub history_len: usize,
    pub artifacts_operational: bool,
    pub artifacts: ArtifactStats,
    pub voice: VoiceStats,
}

// ─────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────

pub struct LessonOrchestrator {
    curriculum: Arc<dyn CurriculumProvider>,
    progress: Arc<dyn ProgressStore>,
    rotation: Arc<RotationSelector>,
    voice: Arc<ResponseEngine>,
    artifacts: ArtifactEngine,
    settings: TutorSettings,
    artifacts_enabled: bool,
    stages: Vec<Stage>,
    history: Mutex<VecDeque<LessonResponse>>,
    completed: AtomicU64,
    fallbacks: AtomicU64,
}

impl LessonOrchestrator {
    pub fn new(
        curriculum: Arc<dyn CurriculumProvider>,
        progress: Arc<dyn ProgressStore>,
        rotation: Arc<RotationSelector>,
        voice: Arc<ResponseEngine>,
        artifacts: ArtifactEngine,
        config: &TutorConfig,
    ) -> Self {
        Self {
            curriculum,
            progress,
            rotation,
            voice,
            artifacts,
            settings: config.tutor.clone(),
            artifacts_enabled: config.artifact.enabled,
            stages: default_stages(),
            history: Mutex::new(VecDeque::with_capacity(config.tutor.history_limit)),
            completed: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Wire the bundled curriculum, personas and templates with the configured
    /// provider and store
    pub fn from_config(config: &TutorConfig) -> Result<Self> {
        let curriculum = Arc::new(StaticCurriculum::bundled()?);
        let pool = Arc::new(PersonaPool::bundled()?);
        let random = SeededRandom::shared(config.rotation.seed);
        let rotation = Arc::new(RotationSelector::new(pool, config.rotation.clone(), random.clone()));
        let voice = Arc::new(ResponseEngine::new(
            Arc::new(TemplateBook::bundled()?),
            &config.voice,
            random,
        ));

        let provider = create_provider(&config.provider, config.artifact.provider_timeout())?;
        let store = create_store(&config.artifact, &config.cache_dir())?;
        let artifacts = ArtifactEngine::new(provider, store, &config.artifact);

        info!(
            lessons = curriculum.lesson_count(),
            artifacts_operational = artifacts.is_operational(),
            "Lesson orchestrator ready"
        );

        Ok(Self::new(curriculum, Arc::new(NoProgress), rotation, voice, artifacts, config))
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressStore>) -> Self {
        self.progress = progress;
        self
    }

    /// Swap the executor of one stage, keeping its name and fallback
    pub fn with_stage_executor(mut self, name: StageName, run: StageExecutor) -> Self {
        if let Some(stage) = self.stages.iter_mut().find(|s| s.name == name) {
            stage.run = run;
        }
        self
    }

    pub fn rotation(&self) -> &RotationSelector {
        &self.rotation
    }

    pub fn voice(&self) -> &ResponseEngine {
        &self.voice
    }

    pub fn artifacts(&self) -> &ArtifactEngine {
        &self.artifacts
    }

    /// Produce the full lesson for a submission. Never fails.
    pub async fn execute_lesson(&self, answer: &str, lesson_number: u32) -> LessonResponse {
        let started = Instant::now();

        let ctx = match self.build_context(answer, lesson_number).await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(
                    lesson = lesson_number,
                    error = %e.format_for_log(),
                    "Lesson could not be prepared, returning fallback response"
                );
                let response = self.fallback_response(answer, lesson_number, &e);
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                self.remember(response.clone());
                return response;
            }
        };

        debug!(
            lesson = lesson_number,
            session = %ctx.session_id,
            cast = ?ctx.cast.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "Executing lesson"
        );

        let env = self.env(&ctx);
        let mut stages = IndexMap::with_capacity(self.stages.len());
        for stage in &self.stages {
            let run = stage.run;
            let outcome = match AssertUnwindSafe(async move { run(env).await }).catch_unwind().await {
                Ok(Ok(payload)) => StageOutcome::completed(payload),
                Ok(Err(e)) => {
                    warn!(
                        lesson = lesson_number,
                        stage = %stage.name,
                        error = %e.format_for_log(),
                        "Stage failed, using fallback"
                    );
                    StageOutcome::fallback((stage.fallback)(&env))
                }
                Err(panic) => {
                    error!(
                        lesson = lesson_number,
                        stage = %stage.name,
                        panic = panic_message(panic.as_ref()),
                        "Stage panicked, using fallback"
                    );
                    StageOutcome::fallback((stage.fallback)(&env))
                }
            };
            stages.insert(stage.name, outcome);
        }

        let score = stages
            .get(&StageName::ScoreReview)
            .and_then(|outcome| outcome.payload.score())
            .unwrap_or(self.settings.neutral_score);

        let summary = self.voice.render(
            Intent::Summary,
            &RenderContext::new(ctx.lesson_number(), ctx.topic())
                .with_persona(ctx.instructor_name())
                .with_score(score)
                .with_recent_scores(ctx.recent_scores.clone()),
        );

        let response = LessonResponse {
            lesson_number,
            topic: ctx.meta.topic.clone(),
            phase: ctx.phase(),
            score,
            stages,
            summary,
            fallback: false,
            error: None,
            session_id: ctx.session_id,
            created_at: ctx.created_at,
        };

        info!(
            lesson = lesson_number,
            score,
            fallback_stages = response.fallback_stages().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Lesson complete"
        );

        self.completed.fetch_add(1, Ordering::Relaxed);
        self.remember(response.clone());
        response
    }

    /// Most recent responses, newest last
    pub fn recent_responses(&self) -> Vec<LessonResponse> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            lessons_completed: self.completed.load(Ordering::Relaxed),
            fallback_responses: self.fallbacks.load(Ordering::Relaxed),
            history_len: self.history.lock().len(),
            artifacts_operational: self.artifacts.is_operational(),
            artifacts: self.artifacts.stats(),
            voice: self.voice.stats(),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────

    async fn build_context(&self, answer: &str, lesson_number: u32) -> Result<LessonContext> {
        let meta = self.curriculum.lookup_lesson(lesson_number).await?;

        let recent_scores = match self.progress.recent_scores(self.settings.recent_scores).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e.format_for_log(), "Progress unavailable, continuing without history");
                Vec::new()
            }
        };

        // Rotation state only advances for lessons that actually run
        let cast = self.rotation.select_cast(lesson_number, &meta);
        Ok(LessonContext::new(meta, answer, cast).with_recent_scores(recent_scores))
    }

    fn env<'a>(&'a self, ctx: &'a LessonContext) -> StageEnv<'a> {
        StageEnv {
            ctx,
            voice: &self.voice,
            artifacts: &self.artifacts,
            artifacts_enabled: self.artifacts_enabled,
            artifact_timeout: self.settings.artifact_timeout(),
            neutral_score: self.settings.neutral_score,
        }
    }

    fn fallback_response(&self, answer: &str, lesson_number: u32, cause: &Error) -> LessonResponse {
        let pool = self.rotation.pool();
        let cast = vec![pool.instructor().clone(), pool.fallback().clone()];
        let ctx = LessonContext::new(LessonMeta::new(lesson_number, UNKNOWN_TOPIC), answer, cast);
        let env = self.env(&ctx);

        let stages = self
            .stages
            .iter()
            .map(|stage| (stage.name, StageOutcome::fallback((stage.fallback)(&env))))
            .collect();

        LessonResponse {
            lesson_number,
            topic: ctx.meta.topic.clone(),
            phase: ctx.phase(),
            score: self.settings.neutral_score,
            stages,
            summary: "We ran into a problem preparing this lesson. Please try again in a moment."
                .to_string(),
            fallback: true,
            error: Some(cause.to_string()),
            session_id: ctx.session_id,
            created_at: ctx.created_at,
        }
    }

    fn remember(&self, response: LessonResponse) {
        let limit = self.settings.history_limit;
        if limit == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= limit {
            history.pop_front();
        }
        history.push_back(response);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{MemoryStore, MockImageProvider, SharedProvider};
    use crate::lesson::stages::{StageFuture, StagePayload};
    use crate::lesson::MemoryProgress;

    fn orchestrator(provider: Option<SharedProvider>, config: &TutorConfig) -> LessonOrchestrator {
        let pool = Arc::new(PersonaPool::bundled().unwrap());
        let random = SeededRandom::shared(Some(11));
        LessonOrchestrator::new(
            Arc::new(StaticCurriculum::bundled().unwrap()),
            Arc::new(NoProgress),
            Arc::new(RotationSelector::new(pool, config.rotation.clone(), random.clone())),
            Arc::new(ResponseEngine::new(
                Arc::new(TemplateBook::bundled().unwrap()),
                &config.voice,
                random,
            )),
            ArtifactEngine::new(provider, Arc::new(MemoryStore::new(16)), &config.artifact),
            config,
        )
    }

    fn always_fails(_env: StageEnv<'_>) -> StageFuture<'_> {
        Box::pin(async { Err(Error::stage_failed(StageName::Explanation, "forced")) })
    }

    #[tokio::test]
    async fn test_lesson_has_six_stages_in_order() {
        let orchestrator = orchestrator(None, &TutorConfig::default());
        let response = orchestrator.execute_lesson("What does guidance do?", 3).await;

        assert!(!response.fallback);
        assert_eq!(response.stages.keys().copied().collect::<Vec<_>>(), StageName::ALL.to_vec());
        assert!(response.fallback_stages().is_empty());
        assert!(!response.summary.is_empty());
        assert!((1.0..=10.0).contains(&response.score));
    }

    #[tokio::test]
    async fn test_unknown_lesson_returns_fallback_response() {
        let orchestrator = orchestrator(None, &TutorConfig::default());
        let response = orchestrator.execute_lesson("anything", 999).await;

        assert!(response.fallback);
        assert_eq!(response.score, 7.0);
        assert_eq!(response.stages.len(), 6);
        assert_eq!(response.fallback_stages().len(), 6);
        assert!(response.error.as_deref().unwrap_or_default().contains("999"));
        assert_eq!(orchestrator.status().fallback_responses, 1);
    }

    #[tokio::test]
    async fn test_failing_stage_is_replaced() {
        let orchestrator = orchestrator(None, &TutorConfig::default())
            .with_stage_executor(StageName::Explanation, always_fails);
        let response = orchestrator.execute_lesson("answer", 5).await;

        assert!(!response.fallback);
        assert_eq!(response.fallback_stages(), vec![StageName::Explanation]);
        assert_eq!(response.stages.len(), 6);
    }

    fn always_panics(_env: StageEnv<'_>) -> StageFuture<'_> {
        Box::pin(async { Ok(Option::<StagePayload>::None.expect("challenge table loaded")) })
    }

    #[tokio::test]
    async fn test_panicking_stage_is_replaced() {
        let orchestrator = orchestrator(None, &TutorConfig::default())
            .with_stage_executor(StageName::ChallengeQuestion, always_panics);
        let response = orchestrator.execute_lesson("answer", 8).await;

        assert!(!response.fallback);
        assert_eq!(response.fallback_stages(), vec![StageName::ChallengeQuestion]);
        assert_eq!(response.stages.len(), 6);
        assert_eq!(orchestrator.status().lessons_completed, 1);
    }

    #[test]
    fn test_panic_message_reads_payload() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let mut config = TutorConfig::default();
        config.tutor.history_limit = 3;
        let orchestrator = orchestrator(None, &config);

        for lesson in 1..=5 {
            orchestrator.execute_lesson("answer", lesson).await;
        }
        let history = orchestrator.recent_responses();
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().map(|r| r.lesson_number).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(orchestrator.status().lessons_completed, 5);
    }

    #[tokio::test]
    async fn test_recent_scores_feed_summary() {
        let progress = Arc::new(MemoryProgress::new(10));
        for score in [9.0, 9.5, 8.5] {
            progress.record(1, score);
        }
        let orchestrator = orchestrator(None, &TutorConfig::default()).with_progress(progress);
        let book = TemplateBook::bundled().unwrap();

        let response = orchestrator.execute_lesson("answer", 2).await;
        assert!(response.summary.contains(&book.progress.strong));
    }

    #[tokio::test]
    async fn test_disabled_artifacts_skip_provider() {
        let mock = Arc::new(MockImageProvider::new());
        let mut config = TutorConfig::default();
        config.artifact.enabled = false;
        let orchestrator = orchestrator(Some(Arc::clone(&mock) as SharedProvider), &config);

        let response = orchestrator.execute_lesson("answer", 4).await;
        let artifact = response.stage(StageName::Artifact).and_then(|o| o.payload.artifact()).unwrap();
        assert!(artifact.fallback_used);
        assert_eq!(mock.call_count(), 0);
    }
}
