//! Image provider trait and construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::mock::MockImageProvider;
use super::openai::OpenAiImageProvider;
use crate::config::{ProviderKind, ProviderSettings};
use crate::error::Result;

/// What the engine asks a provider for
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub lesson_number: u32,
}

/// A successfully generated image
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Remote URL or a `data:` URL for inline images
    pub url: String,
    pub model: String,
}

/// Upstream illustration service.
///
/// The engine calls `generate` at most once per cache key at a time and
/// bounds it with its own timeout; implementations do not retry.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage>;
}

pub type SharedProvider = Arc<dyn ImageProvider>;

/// Provider described by configuration, or `None` when none is configured.
/// `timeout` is the per-call budget the engine enforces.
pub fn create_provider(settings: &ProviderSettings, timeout: Duration) -> Result<Option<SharedProvider>> {
    if !settings.is_configured() {
        info!("No image provider configured, illustrations will use text panels");
        return Ok(None);
    }

    let provider: SharedProvider = match settings.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiImageProvider::new(settings, timeout)?),
        ProviderKind::Mock => Arc::new(MockImageProvider::new().with_latency(Duration::from_millis(50))),
    };
    info!(provider = provider.name(), "Image provider ready");
    Ok(Some(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_provider_is_none() {
        let settings = ProviderSettings::default();
        assert!(create_provider(&settings, Duration::from_secs(1)).unwrap().is_none());

        let settings = ProviderSettings {
            enabled: true,
            ..Default::default()
        };
        // OpenAI kind without a key
        assert!(create_provider(&settings, Duration::from_secs(1)).unwrap().is_none());
    }

    #[test]
    fn test_mock_provider_from_settings() {
        let settings = ProviderSettings {
            enabled: true,
            kind: ProviderKind::Mock,
            ..Default::default()
        };
        let provider = create_provider(&settings, Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn test_openai_provider_from_settings() {
        let settings = ProviderSettings {
            enabled: true,
            api_key: "sk-test".into(),
            ..Default::default()
        };
        let provider = create_provider(&settings, Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
