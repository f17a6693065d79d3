//! Tutor engine
//!
//! Content-generation pipeline for a sixty-lesson image-generation course.
//! A learner's answer and lesson number go in; a six-stage lesson response
//! comes out, voiced by a rotating cast of personas and illustrated when an
//! image provider is available.
//!
//! The entry point is [`lesson::LessonOrchestrator::execute_lesson`], which
//! never fails: every internal problem degrades to a fallback.

pub mod artifact;
pub mod config;
pub mod error;
pub mod lesson;
pub mod logging;
pub mod persona;
pub mod random;
pub mod version;
pub mod voice;

pub use error::{Error, Result};
pub use lesson::{LessonOrchestrator, LessonResponse};
