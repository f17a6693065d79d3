//! OpenAI-compatible image generation provider
//!
//! Posts to `{base_url}/images/generations` once per request. Retrying and
//! timing out are the engine's concern, not this client's.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{GeneratedImage, ImageProvider, ImageRequest};
use crate::config::ProviderSettings;
use crate::error::{Error, Result};

const PROVIDER_NAME: &str = "openai";

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 300;

// ─────────────────────────────────────────────────────────────────
// API types
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
    style: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

// ─────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────

pub struct OpenAiImageProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    size: String,
    quality: String,
    style: String,
    timeout: Duration,
}

impl OpenAiImageProvider {
    /// `timeout` is the engine's per-call budget, applied to the HTTP client too
    pub fn new(settings: &ProviderSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::provider_request(PROVIDER_NAME, format!("failed to build HTTP client: {}", e)))?;

        debug!(base_url = %settings.base_url, model = %settings.model, "OpenAI image provider created");

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            size: settings.size.clone(),
            quality: settings.quality.clone(),
            style: settings.style.clone(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/images/generations", self.base_url)
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let body = ImageGenerationRequest {
            model: &self.model,
            prompt: &request.prompt,
            n: 1,
            size: &self.size,
            quality: &self.quality,
            style: &self.style,
        };

        debug!(lesson = request.lesson_number, model = %self.model, "Requesting illustration");

        let mut req = self.client.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::ProviderTimeout {
                    provider: PROVIDER_NAME.to_string(),
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                Error::provider_request(PROVIDER_NAME, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(Error::provider_response(
                PROVIDER_NAME,
                Some(status.as_u16()),
                format!("HTTP {}: {}", status, text),
            ));
        }

        let parsed: ImageGenerationResponse = response.json().await.map_err(|e| {
            Error::provider_response(PROVIDER_NAME, Some(status.as_u16()), format!("invalid body: {}", e))
        })?;

        let url = image_url(parsed).ok_or_else(|| {
            Error::provider_response(PROVIDER_NAME, Some(status.as_u16()), "response contained no image")
        })?;

        Ok(GeneratedImage {
            url,
            model: self.model.clone(),
        })
    }
}

/// First image as a URL, inlining base64 payloads as a data URL
fn image_url(response: ImageGenerationResponse) -> Option<String> {
    let first = response.data.into_iter().next()?;
    match (first.url, first.b64_json) {
        (Some(url), _) if !url.is_empty() => Some(url),
        (_, Some(b64)) if !b64.is_empty() => Some(format!("data:image/png;base64,{}", b64)),
        _ => None,
    }
}
