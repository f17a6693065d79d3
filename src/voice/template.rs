//! Typed response templates.
//!
//! Template text is parsed once into literal and field segments, so an
//! unknown placeholder is a load error rather than a stray `{brace}` in a
//! lesson.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const BUNDLED_VOICE: &str = include_str!("../../config/voice.toml");

// ─────────────────────────────────────────────────────────────────
// Intents and bands
// ─────────────────────────────────────────────────────────────────

/// What a rendered line is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    Greeting,
    LessonIntro,
    ScoreFeedback,
    Explanation,
    Encouragement,
    Summary,
    ArtifactIntro,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::LessonIntro => "lesson-intro",
            Intent::ScoreFeedback => "score-feedback",
            Intent::Explanation => "explanation",
            Intent::Encouragement => "encouragement",
            Intent::Summary => "summary",
            Intent::ArtifactIntro => "artifact-intro",
        }
    }

    /// Greetings and summaries are meant to vary on every call
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Intent::Greeting | Intent::Summary)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score-feedback pool selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreBand {
    /// 8 and above
    Excellent,
    /// 5 up to 8
    Good,
    /// Below 5
    NeedsWork,
}

impl ScoreBand {
    pub fn from_score(score: f32) -> Self {
        if score >= 8.0 {
            ScoreBand::Excellent
        } else if score >= 5.0 {
            ScoreBand::Good
        } else {
            ScoreBand::NeedsWork
        }
    }
}

/// Key of one template pool in the voice file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolId {
    Greeting,
    LessonIntro,
    Feedback(ScoreBand),
    Explanation,
    Encouragement,
    Summary,
    ArtifactIntro,
}

impl PoolId {
    const ALL: [PoolId; 9] = [
        PoolId::Greeting,
        PoolId::LessonIntro,
        PoolId::Feedback(ScoreBand::Excellent),
        PoolId::Feedback(ScoreBand::Good),
        PoolId::Feedback(ScoreBand::NeedsWork),
        PoolId::Explanation,
        PoolId::Encouragement,
        PoolId::Summary,
        PoolId::ArtifactIntro,
    ];

    /// Pool serving an intent; feedback without a score uses the middle band
    pub fn for_intent(intent: Intent, score: Option<f32>) -> Self {
        match intent {
            Intent::Greeting => PoolId::Greeting,
            Intent::LessonIntro => PoolId::LessonIntro,
            Intent::ScoreFeedback => {
                PoolId::Feedback(score.map(ScoreBand::from_score).unwrap_or(ScoreBand::Good))
            }
            Intent::Explanation => PoolId::Explanation,
            Intent::Encouragement => PoolId::Encouragement,
            Intent::Summary => PoolId::Summary,
            Intent::ArtifactIntro => PoolId::ArtifactIntro,
        }
    }

    pub fn file_key(&self) -> &'static str {
        match self {
            PoolId::Greeting => "greeting",
            PoolId::LessonIntro => "lesson_intro",
            PoolId::Feedback(ScoreBand::Excellent) => "feedback_excellent",
            PoolId::Feedback(ScoreBand::Good) => "feedback_good",
            PoolId::Feedback(ScoreBand::NeedsWork) => "feedback_needs_work",
            PoolId::Explanation => "explanation",
            PoolId::Encouragement => "encouragement",
            PoolId::Summary => "summary",
            PoolId::ArtifactIntro => "artifact_intro",
        }
    }

    fn from_file_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.file_key() == key)
    }
}

// ─────────────────────────────────────────────────────────────────
// Template
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Topic,
    Persona,
    Score,
    Lesson,
    NextLesson,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "topic" => Some(Field::Topic),
            "persona" => Some(Field::Persona),
            "score" => Some(Field::Score),
            "lesson" => Some(Field::Lesson),
            "next_lesson" => Some(Field::NextLesson),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed template line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `text`, rejecting unknown or unterminated placeholders
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut segments = Vec::new();
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| format!("unterminated placeholder in \"{}\"", text))?;
            let name = &after[..close];
            let field = Field::parse(name)
                .ok_or_else(|| format!("unknown placeholder {{{}}} in \"{}\"", name, text))?;
            segments.push(Segment::Field(field));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn uses(&self, field: Field) -> bool {
        self.segments.iter().any(|s| *s == Segment::Field(field))
    }

    pub fn render(&self, ctx: &RenderContext) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Field::Topic) => out.push_str(&ctx.topic),
                Segment::Field(Field::Persona) => out.push_str(&ctx.persona),
                Segment::Field(Field::Score) => match ctx.score {
                    Some(score) => out.push_str(&format!("{:.1}", score)),
                    None => out.push_str("an unscored attempt"),
                },
                Segment::Field(Field::Lesson) => out.push_str(&ctx.lesson_number.to_string()),
                Segment::Field(Field::NextLesson) => {
                    out.push_str(&ctx.lesson_number.saturating_add(1).to_string())
                }
            }
        }
        out
    }
}

/// Values available to templates
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub topic: String,
    pub persona: String,
    pub score: Option<f32>,
    pub lesson_number: u32,
    /// Used only by summaries for the progress assessment
    pub recent_scores: Vec<f32>,
}

impl RenderContext {
    pub fn new(lesson_number: u32, topic: impl Into<String>) -> Self {
        Self {
            lesson_number,
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_recent_scores(mut self, scores: Vec<f32>) -> Self {
        self.recent_scores = scores;
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Template book
// ─────────────────────────────────────────────────────────────────

/// Tone lines, one per intensity band
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToneLines {
    pub restrained: String,
    pub measured: String,
    pub spirited: String,
    pub theatrical: String,
}

impl ToneLines {
    /// Bands: 1-3, 4-6, 7-8, 9-10
    pub fn for_intensity(&self, intensity: u8) -> &str {
        match intensity {
            0..=3 => &self.restrained,
            4..=6 => &self.measured,
            7..=8 => &self.spirited,
            _ => &self.theatrical,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressLines {
    pub strong: String,
    pub steady: String,
    pub developing: String,
    pub no_history: String,
}

impl ProgressLines {
    /// Assessment from the average of recent scores
    pub fn assess(&self, recent: &[f32]) -> &str {
        if recent.is_empty() {
            return &self.no_history;
        }
        let average = recent.iter().sum::<f32>() / recent.len() as f32;
        if average >= 8.0 {
            &self.strong
        } else if average >= 6.0 {
            &self.steady
        } else {
            &self.developing
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextStepLines {
    pub advance: String,
    pub consolidate: String,
    pub review: String,
}

impl NextStepLines {
    pub fn for_score(&self, score: f32) -> &str {
        if score >= 8.0 {
            &self.advance
        } else if score >= 6.0 {
            &self.consolidate
        } else {
            &self.review
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SummaryLines {
    #[serde(default)]
    progress: ProgressLines,
    #[serde(default)]
    next_step: NextStepLines,
}

#[derive(Debug, Deserialize)]
struct VoiceFile {
    #[serde(default)]
    tone: ToneLines,
    #[serde(default)]
    templates: HashMap<String, Vec<String>>,
    #[serde(default)]
    summary: SummaryLines,
}

/// Every template pool plus the tone and summary lines
#[derive(Debug, Clone, Default)]
pub struct TemplateBook {
    pools: HashMap<PoolId, Vec<Template>>,
    pub tone: ToneLines,
    pub progress: ProgressLines,
    pub next_step: NextStepLines,
}

impl TemplateBook {
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str(BUNDLED_VOICE)
    }

    /// Parse a voice file; missing pools are allowed and render a diagnostic
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: VoiceFile =
            toml::from_str(content).map_err(|e| Error::data_parse("voice templates", e.message()))?;

        let mut pools = HashMap::new();
        for (key, lines) in file.templates {
            let id = PoolId::from_file_key(&key).ok_or_else(|| Error::TemplateInvalid {
                intent: key.clone(),
                message: "unknown template pool".to_string(),
            })?;
            let templates = lines
                .iter()
                .map(|line| Template::parse(line))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|message| Error::TemplateInvalid {
                    intent: key.clone(),
                    message,
                })?;
            pools.insert(id, templates);
        }

        Ok(Self {
            pools,
            tone: file.tone,
            progress: file.summary.progress,
            next_step: file.summary.next_step,
        })
    }

    pub fn pool(&self, id: PoolId) -> &[Template] {
        self.pools.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace one pool; used to build reduced books
    pub fn set_pool(&mut self, id: PoolId, templates: Vec<Template>) {
        self.pools.insert(id, templates);
    }

    pub fn template_count(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let template = Template::parse("Lesson {lesson} on {topic}, next is {next_lesson}.").unwrap();
        let ctx = RenderContext::new(7, "Sampling");
        assert_eq!(template.render(&ctx), "Lesson 7 on Sampling, next is 8.");
        assert!(template.uses(Field::Topic));
        assert!(!template.uses(Field::Score));
    }

    #[test]
    fn test_score_renders_one_decimal() {
        let template = Template::parse("{score}/10").unwrap();
        let ctx = RenderContext::new(1, "x").with_score(7.26);
        assert_eq!(template.render(&ctx), "7.3/10");
        assert_eq!(template.render(&RenderContext::new(1, "x")), "an unscored attempt/10");
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = Template::parse("Hello {student}").unwrap_err();
        assert!(err.contains("{student}"));
        assert!(Template::parse("Hello {topic").is_err());
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(ScoreBand::from_score(8.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::from_score(7.9), ScoreBand::Good);
        assert_eq!(ScoreBand::from_score(5.0), ScoreBand::Good);
        assert_eq!(ScoreBand::from_score(4.9), ScoreBand::NeedsWork);
    }

    #[test]
    fn test_bundled_book_has_every_pool() {
        let book = TemplateBook::bundled().unwrap();
        for id in PoolId::ALL {
            assert!(!book.pool(id).is_empty(), "pool {} is empty", id.file_key());
        }
        assert!(!book.tone.theatrical.is_empty());
        assert!(!book.progress.no_history.is_empty());
    }

    #[test]
    fn test_unknown_pool_rejected() {
        let err = TemplateBook::from_toml_str("[templates]\nsmalltalk = [\"hi\"]\n").unwrap_err();
        assert!(matches!(err, Error::TemplateInvalid { .. }));
    }

    #[test]
    fn test_bad_placeholder_in_book_rejected() {
        let err = TemplateBook::from_toml_str("[templates]\ngreeting = [\"hi {nobody}\"]\n").unwrap_err();
        assert!(err.to_string().contains("greeting"));
    }

    #[test]
    fn test_tone_and_summary_bands() {
        let tone = ToneLines {
            restrained: "r".into(),
            measured: "m".into(),
            spirited: "s".into(),
            theatrical: "t".into(),
        };
        assert_eq!(tone.for_intensity(1), "r");
        assert_eq!(tone.for_intensity(3), "r");
        assert_eq!(tone.for_intensity(6), "m");
        assert_eq!(tone.for_intensity(8), "s");
        assert_eq!(tone.for_intensity(10), "t");

        let progress = TemplateBook::bundled().unwrap().progress;
        assert_eq!(progress.assess(&[]), progress.no_history);
        assert_eq!(progress.assess(&[9.0, 8.0]), progress.strong);
        assert_eq!(progress.assess(&[6.0, 6.5]), progress.steady);
        assert_eq!(progress.assess(&[2.0, 5.0]), progress.developing);
    }
}
