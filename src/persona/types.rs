//! Core persona types.
//!
//! Personas are immutable character descriptors. Rotation bookkeeping lives
//! in [`super::rotation`], never on the persona itself.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Persona Role
// ─────────────────────────────────────────────────────────────────

/// How a persona participates in a lesson cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonaRole {
    /// Leads every lesson, always first in the cast.
    Instructor,
    /// Competes for the supporting slot under rotation rules.
    RotatingSupport,
    /// The anchor: takes the supporting slot on a fixed cadence.
    FixedSupport,
}

impl PersonaRole {
    pub fn slug(&self) -> &'static str {
        match self {
            PersonaRole::Instructor => "instructor",
            PersonaRole::RotatingSupport => "rotating-support",
            PersonaRole::FixedSupport => "fixed-support",
        }
    }
}

impl fmt::Display for PersonaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub role: PersonaRole,
    /// Relative selection weight, 1-100.
    pub appearance_frequency: u8,
    #[serde(default)]
    pub traits: BTreeSet<String>,
    #[serde(default)]
    pub voice: String,
    #[serde(default)]
    pub teaching_style: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, role: PersonaRole, appearance_frequency: u8) -> Self {
        Self {
            name: name.into(),
            role,
            appearance_frequency,
            traits: BTreeSet::new(),
            voice: String::new(),
            teaching_style: String::new(),
        }
    }

    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.contains(name)
    }

    pub fn has_any_trait(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has_trait(n))
    }

    pub fn is_instructor(&self) -> bool {
        self.role == PersonaRole::Instructor
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}
