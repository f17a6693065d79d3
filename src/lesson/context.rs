//! Per-submission lesson context.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::curriculum::{Difficulty, LessonMeta, Phase};
use crate::persona::Persona;

/// Everything the stages know about one submission. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct LessonContext {
    #[serde(flatten)]
    pub meta: LessonMeta,
    pub user_answer: String,
    /// Instructor first, then the supporting persona
    pub cast: Vec<Persona>,
    /// Oldest first
    pub recent_scores: Vec<f32>,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LessonContext {
    pub fn new(meta: LessonMeta, user_answer: impl Into<String>, cast: Vec<Persona>) -> Self {
        Self {
            meta,
            user_answer: user_answer.into(),
            cast,
            recent_scores: Vec::new(),
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    pub fn with_recent_scores(mut self, scores: Vec<f32>) -> Self {
        self.recent_scores = scores;
        self
    }

    pub fn lesson_number(&self) -> u32 {
        self.meta.number
    }

    pub fn topic(&self) -> &str {
        &self.meta.topic
    }

    pub fn phase(&self) -> Phase {
        self.meta.phase
    }

    pub fn difficulty(&self) -> Difficulty {
        self.meta.difficulty
    }

    pub fn instructor(&self) -> Option<&Persona> {
        self.cast.first()
    }

    pub fn supporting(&self) -> Option<&Persona> {
        self.cast.get(1)
    }

    /// Instructor name for rendering, with a neutral stand-in
    pub fn instructor_name(&self) -> &str {
        self.instructor().map(|p| p.name.as_str()).unwrap_or("Your instructor")
    }
}
