//! Lesson pipeline
//!
//! Curriculum lookup, answer scoring and the six-stage orchestrator that
//! assembles a lesson response.

pub mod content;
pub mod context;
pub mod curriculum;
pub mod orchestrator;
pub mod progress;
pub mod scoring;
pub mod stages;

pub use context::LessonContext;
pub use curriculum::{CurriculumProvider, Difficulty, LessonMeta, Phase, StaticCurriculum};
pub use orchestrator::{LessonOrchestrator, LessonResponse, OrchestratorStatus};
pub use progress::{MemoryProgress, NoProgress, ProgressStore};
pub use scoring::{analyze_answer, AnswerAnalysis, CategoryScores};
pub use stages::{
    default_stages, Stage, StageEnv, StageExecutor, StageFuture, StageName, StageOutcome, StagePayload,
};
