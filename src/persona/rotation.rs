//! Supporting-cast rotation.
//!
//! Every cast is the instructor followed by one supporting persona. The
//! supporting slot goes to the anchor on a fixed cadence and otherwise to a
//! weighted draw over rotating personas that suit the lesson and are not
//! resting. Selection and the state update happen under one lock, so
//! concurrent lessons never race on streak counts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use super::registry::PersonaPool;
use super::types::Persona;
use crate::config::RotationSettings;
use crate::lesson::{Difficulty, LessonMeta, Phase};
use crate::random::SharedRandom;

/// History grows to this many records before being trimmed
const HISTORY_CAPACITY: usize = 100;
/// Records kept after a trim
const HISTORY_RETAIN: usize = 50;

/// Traits that suit advanced and expert lessons
const TECHNICAL_TRAITS: &[&str] = &["engineering", "technical", "analytical"];
/// Traits that suit quality and optimization topics
const METICULOUS_TRAITS: &[&str] = &["medical", "precise"];
/// Phase and trait pairs that earn the relevance boost
const PHASE_AFFINITY: &[(Phase, &str)] = &[
    (Phase::Foundations, "eager"),
    (Phase::AdvancedControl, "technical"),
];

// ─────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────

/// Per-persona rotation bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RotationState {
    pub last_used_lesson: Option<u32>,
    pub consecutive_uses: u32,
}

impl RotationState {
    /// Streak length that still counts for `lesson_number`.
    ///
    /// A streak only continues into the next lesson; anything older is spent.
    fn live_streak(&self, lesson_number: u32) -> u32 {
        match (self.last_used_lesson, lesson_number.checked_sub(1)) {
            (Some(last), Some(previous)) if last == previous => self.consecutive_uses,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Anchor cadence lesson
    Anchor,
    /// Weighted draw among eligible personas
    Weighted,
    /// Nobody was eligible; the pool's fallback persona was used
    Fallback,
    /// Rotation switched off in configuration
    RotationDisabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationRecord {
    pub lesson_number: u32,
    pub cast: Vec<String>,
    pub reason: SelectionReason,
    pub candidates: usize,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonaUsage {
    pub name: String,
    pub appearance_frequency: u8,
    pub total_appearances: u32,
    pub last_used_lesson: Option<u32>,
    pub consecutive_uses: u32,
}

#[derive(Debug, Default)]
struct RotationBook {
    states: HashMap<String, RotationState>,
    appearances: HashMap<String, u32>,
    history: Vec<RotationRecord>,
}

impl RotationBook {
    fn record_support(&mut self, persona: &Persona, lesson_number: u32, max_consecutive: u32) {
        let state = self.states.entry(persona.name.clone()).or_default();
        let streak = state.live_streak(lesson_number);
        state.consecutive_uses = if streak > 0 {
            (streak + 1).min(max_consecutive)
        } else {
            1
        };
        state.last_used_lesson = Some(lesson_number);
    }

    fn push_history(&mut self, record: RotationRecord) {
        self.history.push(record);
        if self.history.len() > HISTORY_CAPACITY {
            let excess = self.history.len() - HISTORY_RETAIN;
            self.history.drain(..excess);
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Selector
// ─────────────────────────────────────────────────────────────────

pub struct RotationSelector {
    pool: Arc<PersonaPool>,
    settings: RotationSettings,
    random: SharedRandom,
    book: Mutex<RotationBook>,
}

impl RotationSelector {
    pub fn new(pool: Arc<PersonaPool>, settings: RotationSettings, random: SharedRandom) -> Self {
        Self {
            pool,
            settings,
            random,
            book: Mutex::new(RotationBook::default()),
        }
    }

    pub fn pool(&self) -> &PersonaPool {
        &self.pool
    }

    /// Pick the cast for a lesson: instructor first, then one supporting persona.
    ///
    /// Never fails; when nobody is eligible the pool's fallback persona is used.
    pub fn select_cast(&self, lesson_number: u32, meta: &LessonMeta) -> Vec<Persona> {
        let instructor = self.pool.instructor();
        let mut book = self.book.lock();

        let anchor_due = lesson_number % self.settings.anchor_frequency.max(1) == 0;
        let (support, reason, candidates) = if !self.settings.enabled {
            (self.pool.anchor(), SelectionReason::RotationDisabled, 0)
        } else if anchor_due {
            (self.pool.anchor(), SelectionReason::Anchor, 0)
        } else {
            let eligible = self.eligible(lesson_number, meta, &book);
            match self.weighted_draw(&eligible, meta.phase) {
                Some(persona) => (persona, SelectionReason::Weighted, eligible.len()),
                None => (self.pool.fallback(), SelectionReason::Fallback, 0),
            }
        };

        book.record_support(support, lesson_number, self.settings.max_consecutive);
        for persona in [instructor, support] {
            *book.appearances.entry(persona.name.clone()).or_default() += 1;
        }
        book.push_history(RotationRecord {
            lesson_number,
            cast: vec![instructor.name.clone(), support.name.clone()],
            reason,
            candidates,
            recorded_at: Utc::now(),
        });

        debug!(
            lesson = lesson_number,
            support = %support.name,
            ?reason,
            candidates,
            "Cast selected"
        );

        vec![instructor.clone(), support.clone()]
    }

    /// Rotating personas that suit the lesson and are not resting
    fn eligible<'a>(
        &'a self,
        lesson_number: u32,
        meta: &LessonMeta,
        book: &RotationBook,
    ) -> Vec<&'a Persona> {
        self.pool
            .rotating()
            .filter(|p| self.suits_lesson(p, meta))
            .filter(|p| self.rotation_allows(p, lesson_number, book))
            .collect()
    }

    fn suits_lesson(&self, persona: &Persona, meta: &LessonMeta) -> bool {
        if meta.difficulty == Difficulty::Beginner {
            persona.appearance_frequency >= self.settings.low_frequency_threshold
        } else if meta.difficulty.is_advanced() {
            persona.has_any_trait(TECHNICAL_TRAITS)
        } else if meta.topic_contains("quality") || meta.topic_contains("optimization") {
            persona.has_any_trait(METICULOUS_TRAITS)
        } else {
            true
        }
    }

    fn rotation_allows(&self, persona: &Persona, lesson_number: u32, book: &RotationBook) -> bool {
        let Some(state) = book.states.get(&persona.name) else {
            return true;
        };

        if state.live_streak(lesson_number) >= self.settings.max_consecutive {
            trace!(persona = %persona.name, "Excluded: consecutive limit reached");
            return false;
        }

        if persona.appearance_frequency <= self.settings.low_frequency_threshold {
            if let Some(last) = state.last_used_lesson {
                let rest = i64::from(self.settings.gap_numerator / u32::from(persona.appearance_frequency));
                if i64::from(lesson_number) - i64::from(last) < rest {
                    trace!(persona = %persona.name, last, rest, "Excluded: still resting");
                    return false;
                }
            }
        }

        true
    }

    /// Cumulative-weight draw; `None` only for an empty candidate list
    fn weighted_draw<'a>(&self, candidates: &[&'a Persona], phase: Phase) -> Option<&'a Persona> {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|p| {
                let boosted = PHASE_AFFINITY
                    .iter()
                    .any(|(affine_phase, trait_name)| *affine_phase == phase && p.has_trait(trait_name));
                let boost = if boosted { self.settings.relevance_boost } else { 1.0 };
                f64::from(p.appearance_frequency) * boost
            })
            .collect();

        let total: f64 = weights.iter().sum();
        let mut target = total * self.random.next_f64();

        for (persona, weight) in candidates.iter().zip(&weights) {
            if target < *weight {
                return Some(persona);
            }
            target -= weight;
        }

        candidates.last().copied()
    }

    // ─────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────

    pub fn state_of(&self, name: &str) -> Option<RotationState> {
        self.book.lock().states.get(name).copied()
    }

    /// Most recent selections, oldest first
    pub fn history(&self, limit: usize) -> Vec<RotationRecord> {
        let book = self.book.lock();
        let start = book.history.len().saturating_sub(limit);
        book.history[start..].to_vec()
    }

    pub fn usage_stats(&self) -> Vec<PersonaUsage> {
        let book = self.book.lock();
        self.pool
            .all()
            .iter()
            .map(|p| {
                let state = book.states.get(&p.name).copied().unwrap_or_default();
                PersonaUsage {
                    name: p.name.clone(),
                    appearance_frequency: p.appearance_frequency,
                    total_appearances: book.appearances.get(&p.name).copied().unwrap_or(0),
                    last_used_lesson: state.last_used_lesson,
                    consecutive_uses: state.consecutive_uses,
                }
            })
            .collect()
    }

    /// Forget all rotation state and history
    pub fn reset(&self) {
        *self.book.lock() = RotationBook::default();
        debug!("Rotation state reset");
    }
}
