//! Instructor voice: typed templates and the response engine.

pub mod engine;
pub mod template;

pub use engine::{ResponseEngine, VoiceStats, DIAGNOSTIC_LINE};
pub use template::{Intent, PoolId, RenderContext, ScoreBand, Template, TemplateBook};
