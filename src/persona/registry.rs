//! Persona pool loaded once at startup.
//!
//! The bundled pool ships inside the binary; a custom pool file with the
//! same layout can be loaded instead.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::types::{Persona, PersonaRole};
use crate::error::{Error, Result};

const BUNDLED_POOL: &str = include_str!("../../config/personas.toml");

#[derive(Debug, Deserialize)]
struct PoolFile {
    fallback: String,
    persona: Vec<Persona>,
}

/// Validated, read-only set of personas.
#[derive(Debug, Clone)]
pub struct PersonaPool {
    personas: Vec<Persona>,
    instructor: usize,
    anchor: usize,
    fallback: usize,
}

impl PersonaPool {
    /// The pool shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str("bundled persona pool", BUNDLED_POOL)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&path.display().to_string(), &content)
    }

    pub fn from_toml_str(source_name: &str, content: &str) -> Result<Self> {
        let file: PoolFile =
            toml::from_str(content).map_err(|e| Error::data_parse(source_name, e.message()))?;
        Self::new(file.persona, &file.fallback)
    }

    /// Build a pool, checking the structural rules selection relies on
    pub fn new(personas: Vec<Persona>, fallback: &str) -> Result<Self> {
        let mut seen = HashSet::new();
        for persona in &personas {
            if !seen.insert(persona.name.as_str()) {
                return Err(Error::data_invalid(
                    "persona pool",
                    format!("duplicate persona '{}'", persona.name),
                ));
            }
            if !(1..=100).contains(&persona.appearance_frequency) {
                return Err(Error::data_invalid(
                    "persona pool",
                    format!(
                        "'{}' has appearance_frequency {} outside 1-100",
                        persona.name, persona.appearance_frequency
                    ),
                ));
            }
        }

        let instructor = single_role(&personas, PersonaRole::Instructor)?;
        let anchor = single_role(&personas, PersonaRole::FixedSupport)?;

        if !personas.iter().any(|p| p.role == PersonaRole::RotatingSupport) {
            return Err(Error::data_invalid(
                "persona pool",
                "at least one rotating-support persona is required",
            ));
        }

        let fallback = personas
            .iter()
            .position(|p| p.name == fallback && p.role == PersonaRole::RotatingSupport)
            .ok_or_else(|| {
                Error::data_invalid(
                    "persona pool",
                    format!("fallback '{}' must name a rotating-support persona", fallback),
                )
            })?;

        debug!(count = personas.len(), "Persona pool loaded");

        Ok(Self {
            personas,
            instructor,
            anchor,
            fallback,
        })
    }

    pub fn instructor(&self) -> &Persona {
        &self.personas[self.instructor]
    }

    /// The fixed-support persona featured every `anchor_frequency` lessons
    pub fn anchor(&self) -> &Persona {
        &self.personas[self.anchor]
    }

    /// Deterministic choice when no rotating persona is eligible
    pub fn fallback(&self) -> &Persona {
        &self.personas[self.fallback]
    }

    pub fn rotating(&self) -> impl Iterator<Item = &Persona> {
        self.personas
            .iter()
            .filter(|p| p.role == PersonaRole::RotatingSupport)
    }

    pub fn find(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name == name)
    }

    pub fn all(&self) -> &[Persona] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

fn single_role(personas: &[Persona], role: PersonaRole) -> Result<usize> {
    let mut matches = personas
        .iter()
        .enumerate()
        .filter(|(_, p)| p.role == role)
        .map(|(i, _)| i);

    match (matches.next(), matches.next()) {
        (Some(index), None) => Ok(index),
        (None, _) => Err(Error::data_invalid(
            "persona pool",
            format!("no {} persona", role),
        )),
        (Some(_), Some(_)) => Err(Error::data_invalid(
            "persona pool",
            format!("more than one {} persona", role),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(fallback: &str) -> Vec<Persona> {
        vec![
            Persona::new("Lead", PersonaRole::Instructor, 100),
            Persona::new("Anchor", PersonaRole::FixedSupport, 33),
            Persona::new("Helper", PersonaRole::RotatingSupport, 12),
            Persona::new(fallback, PersonaRole::RotatingSupport, 20),
        ]
    }

    #[test]
    fn test_bundled_pool_shape() {
        let pool = PersonaPool::bundled().unwrap();
        assert_eq!(pool.len(), 16);
        assert_eq!(pool.instructor().role, PersonaRole::Instructor);
        assert_eq!(pool.anchor().role, PersonaRole::FixedSupport);
        assert_eq!(pool.rotating().count(), 14);
        assert_eq!(pool.fallback().name, "Pip Calloway");
    }

    #[test]
    fn test_pool_requires_single_instructor() {
        let mut personas = minimal("Spare");
        personas.push(Persona::new("Second Lead", PersonaRole::Instructor, 90));
        let err = PersonaPool::new(personas, "Spare").unwrap_err();
        assert!(err.to_string().contains("more than one instructor"));
    }

    #[test]
    fn test_pool_rejects_out_of_range_frequency() {
        let mut personas = minimal("Spare");
        personas[2].appearance_frequency = 0;
        assert!(PersonaPool::new(personas, "Spare").is_err());
    }

    #[test]
    fn test_fallback_must_rotate() {
        assert!(PersonaPool::new(minimal("Spare"), "Anchor").is_err());
        assert!(PersonaPool::new(minimal("Spare"), "Nobody").is_err());
        assert!(PersonaPool::new(minimal("Spare"), "Spare").is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut personas = minimal("Spare");
        personas.push(Persona::new("Helper", PersonaRole::RotatingSupport, 5));
        assert!(PersonaPool::new(personas, "Spare").is_err());
    }
}
