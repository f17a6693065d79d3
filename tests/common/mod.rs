//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use tutor_engine::artifact::{ArtifactEngine, MemoryStore, SharedProvider};
use tutor_engine::config::TutorConfig;
use tutor_engine::error::{Error, Result};
use tutor_engine::lesson::{CurriculumProvider, LessonMeta, LessonOrchestrator, NoProgress, StaticCurriculum};
use tutor_engine::persona::{PersonaPool, RotationSelector};
use tutor_engine::random::SeededRandom;
use tutor_engine::voice::{ResponseEngine, TemplateBook};

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Get the valid config fixture path
pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

/// Get the invalid config fixture path
pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Curriculum that is always unreachable
pub struct OfflineCurriculum;

#[async_trait]
impl CurriculumProvider for OfflineCurriculum {
    async fn lookup_lesson(&self, _lesson_number: u32) -> Result<LessonMeta> {
        Err(Error::Curriculum("catalogue service offline".to_string()))
    }

    fn lesson_count(&self) -> u32 {
        0
    }
}

pub fn bundled_curriculum() -> Arc<dyn CurriculumProvider> {
    Arc::new(StaticCurriculum::bundled().unwrap())
}

/// Orchestrator over bundled data with a memory store and a fixed seed
pub fn orchestrator(
    provider: Option<SharedProvider>,
    curriculum: Arc<dyn CurriculumProvider>,
    config: &TutorConfig,
) -> LessonOrchestrator {
    let pool = Arc::new(PersonaPool::bundled().unwrap());
    let random = SeededRandom::shared(Some(2024));
    let rotation = Arc::new(RotationSelector::new(pool, config.rotation.clone(), random.clone()));
    let voice = Arc::new(ResponseEngine::new(
        Arc::new(TemplateBook::bundled().unwrap()),
        &config.voice,
        random,
    ));
    let artifacts = ArtifactEngine::new(provider, Arc::new(MemoryStore::new(32)), &config.artifact);

    LessonOrchestrator::new(curriculum, Arc::new(NoProgress), rotation, voice, artifacts, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_dir_exists() {
        assert!(fixtures_dir().exists(), "Fixtures directory should exist");
    }

    #[test]
    fn test_valid_config_exists() {
        assert!(
            valid_config_fixture().exists(),
            "Valid config fixture should exist"
        );
    }

    #[test]
    fn test_invalid_config_exists() {
        assert!(
            invalid_config_fixture().exists(),
            "Invalid config fixture should exist"
        );
    }
}
