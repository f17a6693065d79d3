//! Lesson illustrations
//!
//! Cached, deduplicated image generation with a text-panel fallback for
//! every failure path.

pub mod cache;
pub mod engine;
pub mod fallback;
pub mod key;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod store;
pub mod types;

pub use cache::CacheEntry;
pub use engine::{ArtifactEngine, ArtifactStats};
pub use fallback::{fallback_artifact, timed_out_artifact};
pub use key::CacheKey;
pub use mock::{MockBehavior, MockImageProvider};
pub use openai::OpenAiImageProvider;
pub use provider::{create_provider, GeneratedImage, ImageProvider, ImageRequest, SharedProvider};
pub use store::{create_store, ArtifactStore, FileStore, MemoryStore, SharedStore};
pub use types::{ArtifactPayload, ArtifactResult, Panel, FALLBACK_PROVIDER};
