//! Lesson metadata and the curriculum lookup seam.
//!
//! The pipeline only ever asks the curriculum one question: what is lesson N
//! about. `StaticCurriculum` answers it from the bundled catalogue; callers
//! with their own content store implement [`CurriculumProvider`].

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const BUNDLED_CURRICULUM: &str = include_str!("../../config/curriculum.toml");

/// Lessons per phase in the bundled catalogue
const LESSONS_PER_PHASE: u32 = 15;

// ─────────────────────────────────────────────────────────────────
// Phase & Difficulty
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "Foundations")]
    Foundations,
    #[serde(rename = "Intermediate Tools")]
    IntermediateTools,
    #[serde(rename = "Advanced Control")]
    AdvancedControl,
    #[serde(rename = "Cutting-Edge & Specialized")]
    CuttingEdge,
}

impl Phase {
    /// Phase a lesson number falls into (numbers past the end stay in the last phase)
    pub fn for_lesson(lesson_number: u32) -> Self {
        match lesson_number.saturating_sub(1) / LESSONS_PER_PHASE {
            0 => Phase::Foundations,
            1 => Phase::IntermediateTools,
            2 => Phase::AdvancedControl,
            _ => Phase::CuttingEdge,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Foundations => "Foundations",
            Phase::IntermediateTools => "Intermediate Tools",
            Phase::AdvancedControl => "Advanced Control",
            Phase::CuttingEdge => "Cutting-Edge & Specialized",
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        match self {
            Phase::Foundations => Difficulty::Beginner,
            Phase::IntermediateTools => Difficulty::Intermediate,
            Phase::AdvancedControl => Difficulty::Advanced,
            Phase::CuttingEdge => Difficulty::Expert,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }

    /// Advanced and expert lessons favour technically minded personas
    pub fn is_advanced(&self) -> bool {
        matches!(self, Difficulty::Advanced | Difficulty::Expert)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Lesson Metadata
// ─────────────────────────────────────────────────────────────────

/// What the curriculum knows about one lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonMeta {
    pub number: u32,
    pub topic: String,
    pub phase: Phase,
    pub difficulty: Difficulty,
    /// Key concepts, also used for answer keyword matching
    pub keywords: Vec<String>,
    pub objectives: Vec<String>,
}

impl LessonMeta {
    /// Metadata for a lesson with phase and difficulty derived from its number
    pub fn new(number: u32, topic: impl Into<String>) -> Self {
        let phase = Phase::for_lesson(number);
        Self {
            number,
            topic: topic.into(),
            phase,
            difficulty: phase.difficulty(),
            keywords: Vec::new(),
            objectives: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn topic_contains(&self, needle: &str) -> bool {
        self.topic.to_lowercase().contains(&needle.to_lowercase())
    }
}

// ─────────────────────────────────────────────────────────────────
// Curriculum Provider
// ─────────────────────────────────────────────────────────────────

#[async_trait]
pub trait CurriculumProvider: Send + Sync {
    async fn lookup_lesson(&self, lesson_number: u32) -> Result<LessonMeta>;

    /// Number of lessons the provider knows about
    fn lesson_count(&self) -> u32;
}

#[derive(Debug, Deserialize)]
struct CatalogueFile {
    lesson: Vec<CatalogueEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogueEntry {
    number: u32,
    topic: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    objectives: Vec<String>,
}

/// Curriculum backed by an in-memory catalogue
#[derive(Debug, Clone)]
pub struct StaticCurriculum {
    lessons: BTreeMap<u32, LessonMeta>,
}

impl StaticCurriculum {
    /// The sixty-lesson catalogue shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str("bundled curriculum", BUNDLED_CURRICULUM)
    }

    pub fn from_toml_str(source_name: &str, content: &str) -> Result<Self> {
        let file: CatalogueFile =
            toml::from_str(content).map_err(|e| Error::data_parse(source_name, e.message()))?;

        let mut lessons = BTreeMap::new();
        for entry in file.lesson {
            if entry.number == 0 {
                return Err(Error::data_invalid("curriculum", "lesson numbers start at 1"));
            }
            if entry.topic.trim().is_empty() {
                return Err(Error::data_invalid(
                    "curriculum",
                    format!("lesson {} has no topic", entry.number),
                ));
            }
            let meta = LessonMeta {
                objectives: entry.objectives,
                ..LessonMeta::new(entry.number, entry.topic).with_keywords(entry.keywords)
            };
            if lessons.insert(meta.number, meta).is_some() {
                return Err(Error::data_invalid(
                    "curriculum",
                    format!("lesson {} is listed twice", entry.number),
                ));
            }
        }

        // Numbers must run 1..=N without holes
        for (expected, number) in (1..).zip(lessons.keys()) {
            if *number != expected {
                return Err(Error::data_invalid(
                    "curriculum",
                    format!("lesson {} is missing", expected),
                ));
            }
        }

        Ok(Self { lessons })
    }

    pub fn from_lessons(lessons: impl IntoIterator<Item = LessonMeta>) -> Self {
        Self {
            lessons: lessons.into_iter().map(|l| (l.number, l)).collect(),
        }
    }

    pub fn get(&self, lesson_number: u32) -> Option<&LessonMeta> {
        self.lessons.get(&lesson_number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LessonMeta> {
        self.lessons.values()
    }
}

#[async_trait]
impl CurriculumProvider for StaticCurriculum {
    async fn lookup_lesson(&self, lesson_number: u32) -> Result<LessonMeta> {
        self.lessons
            .get(&lesson_number)
            .cloned()
            .ok_or(Error::LessonNotFound { lesson_number })
    }

    fn lesson_count(&self) -> u32 {
        self.lessons.len() as u32
    }
}
