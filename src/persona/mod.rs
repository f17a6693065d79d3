//! Persona system
//!
//! A fixed pool of characters voices every lesson. The instructor leads
//! each one; a supporting persona is chosen per lesson by the rotation
//! selector.

pub mod registry;
pub mod rotation;
pub mod types;

pub use registry::PersonaPool;
pub use rotation::{PersonaUsage, RotationRecord, RotationSelector, RotationState, SelectionReason};
pub use types::{Persona, PersonaRole};
