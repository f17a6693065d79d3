//! Mock image provider
//!
//! Offline stand-in used by tests and by the `mock` provider kind.

use std::future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::provider::{GeneratedImage, ImageProvider, ImageRequest};
use crate::error::{Error, Result};

/// How the mock answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Succeed,
    Fail,
    /// Never completes; only a caller timeout ends the call
    Hang,
}

pub struct MockImageProvider {
    behavior: RwLock<MockBehavior>,
    latency: Duration,
    calls: AtomicU32,
}

impl Default for MockImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockImageProvider {
    pub fn new() -> Self {
        Self {
            behavior: RwLock::new(MockBehavior::Succeed),
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::new().with_behavior(MockBehavior::Fail)
    }

    pub fn hanging() -> Self {
        Self::new().with_behavior(MockBehavior::Hang)
    }

    pub fn with_behavior(self, behavior: MockBehavior) -> Self {
        *self.behavior.write() = behavior;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write() = behavior;
    }

    /// Number of `generate` calls so far
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.read();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match behavior {
            MockBehavior::Succeed => Ok(GeneratedImage {
                url: format!("https://images.invalid/lesson-{}.png", request.lesson_number),
                model: "mock-image".to_string(),
            }),
            MockBehavior::Fail => Err(Error::provider_response("mock", Some(500), "simulated failure")),
            MockBehavior::Hang => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ImageRequest {
        ImageRequest {
            prompt: "p".into(),
            lesson_number: 12,
        }
    }

    #[tokio::test]
    async fn test_mock_succeeds_and_counts() {
        let mock = MockImageProvider::new();
        let image = mock.generate(&request()).await.unwrap();
        assert!(image.url.contains("lesson-12"));
        assert_eq!(mock.call_count(), 1);

        mock.reset_counts();
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockImageProvider::failing();
        assert!(mock.generate(&request()).await.is_err());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_hang_never_completes() {
        let mock = MockImageProvider::hanging();
        let outcome = tokio::time::timeout(Duration::from_millis(20), mock.generate(&request())).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_behavior_can_change() {
        let mock = MockImageProvider::failing();
        mock.set_behavior(MockBehavior::Succeed);
        assert!(mock.generate(&request()).await.is_ok());
    }
}
