//! Artifact result types shared by the engine, stores and providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lesson::LessonMeta;
use crate::persona::Persona;

/// Provider name recorded on synthesised artifacts
pub const FALLBACK_PROVIDER: &str = "fallback";

/// One panel of a text comic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub panel: u8,
    pub scene: String,
    pub dialogue: Vec<String>,
    pub focus: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactPayload {
    /// A generated illustration
    Image { url: String, prompt: String },
    /// Text panels standing in for an illustration
    Panels { panels: Vec<Panel> },
}

impl ArtifactPayload {
    pub fn is_image(&self) -> bool {
        matches!(self, ArtifactPayload::Image { .. })
    }

    pub fn panels(&self) -> &[Panel] {
        match self {
            ArtifactPayload::Panels { panels } => panels,
            ArtifactPayload::Image { .. } => &[],
        }
    }
}

/// Outcome of an illustration request. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactResult {
    pub success: bool,
    pub fallback_used: bool,
    /// Provider name, or `"fallback"` for synthesised panels
    pub provider: String,
    pub payload: ArtifactPayload,
    pub lesson_number: u32,
    pub topic: String,
    pub characters_featured: Vec<String>,
    /// Served from the artifact cache
    #[serde(default)]
    pub cached: bool,
    /// The caller stopped waiting and substituted panels
    #[serde(default)]
    pub timed_out: bool,
    pub generated_at: DateTime<Utc>,
}

impl ArtifactResult {
    pub fn image(
        meta: &LessonMeta,
        cast: &[Persona],
        provider: impl Into<String>,
        url: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            fallback_used: false,
            provider: provider.into(),
            payload: ArtifactPayload::Image {
                url: url.into(),
                prompt: prompt.into(),
            },
            lesson_number: meta.number,
            topic: meta.topic.clone(),
            characters_featured: cast_names(cast),
            cached: false,
            timed_out: false,
            generated_at: Utc::now(),
        }
    }

    pub fn panels(meta: &LessonMeta, cast: &[Persona], panels: Vec<Panel>) -> Self {
        Self {
            success: false,
            fallback_used: true,
            provider: FALLBACK_PROVIDER.to_string(),
            payload: ArtifactPayload::Panels { panels },
            lesson_number: meta.number,
            topic: meta.topic.clone(),
            characters_featured: cast_names(cast),
            cached: false,
            timed_out: false,
            generated_at: Utc::now(),
        }
    }
}

fn cast_names(cast: &[Persona]) -> Vec<String> {
    cast.iter().map(|p| p.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serialises_with_kind_tag() {
        let payload = ArtifactPayload::Image {
            url: "https://img.example/1.png".into(),
            prompt: "a comic".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["url"], "https://img.example/1.png");

        let panels = ArtifactPayload::Panels { panels: vec![] };
        assert_eq!(serde_json::to_value(&panels).unwrap()["kind"], "panels");
    }

    #[test]
    fn test_result_constructors() {
        let meta = LessonMeta::new(5, "Sampling Methods");
        let image = ArtifactResult::image(&meta, &[], "openai", "u", "p");
        assert!(image.success && !image.fallback_used);
        assert!(image.payload.is_image());

        let fallback = ArtifactResult::panels(&meta, &[], vec![]);
        assert!(!fallback.success && fallback.fallback_used);
        assert_eq!(fallback.provider, FALLBACK_PROVIDER);
        assert_eq!(fallback.lesson_number, 5);
    }
}
