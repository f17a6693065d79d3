//! Configuration system for the tutor engine
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (TUTOR_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Orchestrator behaviour
    pub tutor: TutorSettings,

    /// Supporting-cast rotation policy
    pub rotation: RotationSettings,

    /// Persona voice and response cache
    pub voice: VoiceSettings,

    /// Illustration cache and generation budget
    pub artifact: ArtifactSettings,

    /// Image generation provider
    pub provider: ProviderSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorSettings {
    /// Score reported when a lesson cannot be produced at all
    pub neutral_score: f32,

    /// Number of completed responses kept for diagnostics
    pub history_limit: usize,

    /// How many recent scores to request from the progress store
    pub recent_scores: usize,

    /// Upper bound on waiting for the illustration stage (milliseconds)
    pub artifact_timeout_ms: u64,
}

/// Rotation policy for the supporting cast
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    /// When disabled every lesson gets the instructor and the anchor persona
    pub enabled: bool,

    /// Maximum number of consecutive lessons a supporting persona may appear in
    pub max_consecutive: u32,

    /// Every Nth lesson features the anchor persona
    pub anchor_frequency: u32,

    /// Personas at or below this appearance frequency must rest between appearances
    pub low_frequency_threshold: u8,

    /// Rest period numerator: a persona rests floor(gap_numerator / frequency) lessons
    pub gap_numerator: u32,

    /// Weight multiplier for personas whose traits suit the lesson phase
    pub relevance_boost: f64,

    /// Seed for reproducible selection (random when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Persona voice settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Tone intensity, 1 (restrained) to 10 (theatrical)
    pub intensity: u8,

    /// Maximum number of cached rendered responses
    pub cache_size: usize,
}

/// Where generated artifacts are cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    File,
}

/// Illustration cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Produce an illustration stage at all
    pub enabled: bool,

    /// Lifetime of a cached illustration in seconds
    pub ttl_secs: u64,

    /// Maximum number of cached illustrations
    pub max_entries: usize,

    /// Cache backend
    pub store: StoreKind,

    /// Directory used by the file store
    pub cache_dir: String,

    /// Hard budget for a single provider call (milliseconds)
    pub provider_timeout_ms: u64,
}

/// Which provider implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible images endpoint
    OpenAi,
    /// Offline stand-in that returns placeholder images
    Mock,
}

/// Image generation provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Use a provider at all; when false every illustration is a text comic
    pub enabled: bool,

    pub kind: ProviderKind,

    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// API key, required for the openai kind
    pub api_key: String,

    pub model: String,

    /// Image size, e.g. "1024x1024"
    pub size: String,

    pub quality: String,

    pub style: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for TutorSettings {
    fn default() -> Self {
        Self {
            neutral_score: 7.0,
            history_limit: 10,
            recent_scores: 5,
            artifact_timeout_ms: 30_000,
        }
    }
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_consecutive: 2,
            anchor_frequency: 3,
            low_frequency_threshold: 10,
            gap_numerator: 20,
            relevance_boost: 1.5,
            seed: None,
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            intensity: 7,
            cache_size: 1000,
        }
    }
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 7 * 24 * 60 * 60,
            max_entries: 100,
            store: StoreKind::Memory,
            cache_dir: "~/.tutor-engine/artifacts".to_string(),
            provider_timeout_ms: 25_000,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: ProviderKind::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
            style: "vivid".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl ArtifactSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

impl TutorSettings {
    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_millis(self.artifact_timeout_ms)
    }
}

impl ProviderSettings {
    /// A provider is usable when enabled and, for the HTTP kind, holding a key
    pub fn is_configured(&self) -> bool {
        match self.kind {
            ProviderKind::Mock => self.enabled,
            ProviderKind::OpenAi => self.enabled && !self.api_key.is_empty(),
        }
    }
}

impl TutorConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML file without applying overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("tutor-engine.toml"),
            dirs::config_dir()
                .map(|p| p.join("tutor-engine").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".tutor-engine").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/tutor-engine/config.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Orchestrator
        env_parse("TUTOR_NEUTRAL_SCORE", &mut self.tutor.neutral_score);
        env_parse("TUTOR_HISTORY_LIMIT", &mut self.tutor.history_limit);
        env_parse("TUTOR_ARTIFACT_TIMEOUT_MS", &mut self.tutor.artifact_timeout_ms);

        // Rotation
        env_flag("TUTOR_ROTATION_ENABLED", &mut self.rotation.enabled);
        env_parse("TUTOR_ROTATION_MAX_CONSECUTIVE", &mut self.rotation.max_consecutive);
        env_parse("TUTOR_ROTATION_ANCHOR_FREQUENCY", &mut self.rotation.anchor_frequency);
        if let Ok(val) = std::env::var("TUTOR_ROTATION_SEED") {
            if let Ok(n) = val.parse() {
                self.rotation.seed = Some(n);
            }
        }

        // Voice
        env_parse("TUTOR_VOICE_INTENSITY", &mut self.voice.intensity);
        env_parse("TUTOR_VOICE_CACHE_SIZE", &mut self.voice.cache_size);

        // Artifact cache
        env_flag("TUTOR_ARTIFACT_ENABLED", &mut self.artifact.enabled);
        env_parse("TUTOR_ARTIFACT_TTL_SECS", &mut self.artifact.ttl_secs);
        env_parse("TUTOR_ARTIFACT_MAX_ENTRIES", &mut self.artifact.max_entries);
        env_parse("TUTOR_PROVIDER_TIMEOUT_MS", &mut self.artifact.provider_timeout_ms);
        if let Ok(val) = std::env::var("TUTOR_ARTIFACT_STORE") {
            match val.to_lowercase().as_str() {
                "memory" => self.artifact.store = StoreKind::Memory,
                "file" => self.artifact.store = StoreKind::File,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("TUTOR_ARTIFACT_CACHE_DIR") {
            self.artifact.cache_dir = val;
        }

        // Provider
        env_flag("TUTOR_PROVIDER_ENABLED", &mut self.provider.enabled);
        if let Ok(val) = std::env::var("TUTOR_PROVIDER_KIND") {
            match val.to_lowercase().as_str() {
                "openai" => self.provider.kind = ProviderKind::OpenAi,
                "mock" => self.provider.kind = ProviderKind::Mock,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("TUTOR_PROVIDER_BASE_URL") {
            self.provider.base_url = val;
        }
        if let Ok(val) = std::env::var("TUTOR_PROVIDER_API_KEY") {
            self.provider.api_key = val;
        }
        if let Ok(val) = std::env::var("TUTOR_PROVIDER_MODEL") {
            self.provider.model = val;
        }

        // Logging
        if let Ok(val) = std::env::var("TUTOR_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("TUTOR_LOG_FILE") {
            self.logging.file = Some(val);
        }
        env_flag("TUTOR_LOG_JSON", &mut self.logging.json_format);
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.artifact.cache_dir = expand_path(&self.artifact.cache_dir);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(1.0..=10.0).contains(&self.tutor.neutral_score) {
            return Err(Error::config_field_invalid(
                "tutor.neutral_score",
                "neutral_score must be between 1 and 10",
            ));
        }
        if self.tutor.history_limit == 0 {
            return Err(Error::config_field_invalid(
                "tutor.history_limit",
                "history_limit must be at least 1",
            ));
        }

        if self.rotation.max_consecutive == 0 {
            return Err(Error::config_field_invalid(
                "rotation.max_consecutive",
                "max_consecutive must be at least 1",
            ));
        }
        if self.rotation.anchor_frequency == 0 {
            return Err(Error::config_field_invalid(
                "rotation.anchor_frequency",
                "anchor_frequency must be at least 1",
            ));
        }
        if !(self.rotation.relevance_boost.is_finite() && self.rotation.relevance_boost > 0.0) {
            return Err(Error::config_field_invalid(
                "rotation.relevance_boost",
                "relevance_boost must be a positive number",
            ));
        }

        if !(1..=10).contains(&self.voice.intensity) {
            return Err(Error::config_field_invalid(
                "voice.intensity",
                "intensity must be between 1 and 10",
            ));
        }
        if self.voice.cache_size == 0 {
            return Err(Error::config_field_invalid(
                "voice.cache_size",
                "cache_size must be at least 1",
            ));
        }

        if self.artifact.max_entries == 0 {
            return Err(Error::config_field_invalid(
                "artifact.max_entries",
                "max_entries must be at least 1",
            ));
        }
        if self.artifact.store == StoreKind::File && self.artifact.cache_dir.is_empty() {
            return Err(Error::config_field_invalid(
                "artifact.cache_dir",
                "the file store needs a cache_dir",
            ));
        }

        match url::Url::parse(&self.provider.base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(Error::config_field_invalid(
                    "provider.base_url",
                    format!("unsupported scheme '{}', expected http or https", parsed.scheme()),
                ));
            }
            Err(e) => {
                return Err(Error::config_field_invalid(
                    "provider.base_url",
                    format!("'{}' is not a valid URL: {}", self.provider.base_url, e),
                ));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.artifact.cache_dir)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Ok(val) = std::env::var(name) {
        if let Ok(parsed) = val.parse() {
            *target = parsed;
        }
    }
}

fn env_flag(name: &str, target: &mut bool) {
    if let Ok(val) = std::env::var(name) {
        *target = val.to_lowercase() == "true" || val == "1";
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location for `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tutor-engine")
        .join("config.toml")
}

/// Write a commented default configuration file, returning where it went
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Default configuration content with comments
pub fn generate_default_config() -> &'static str {
    r#"# Tutor Engine Configuration

[tutor]
# Score reported when a lesson cannot be produced at all (1-10)
neutral_score = 7.0

# Completed lesson responses kept in memory for diagnostics
history_limit = 10

# Recent scores consulted when writing the lesson summary
recent_scores = 5

# How long a lesson waits for its illustration (milliseconds)
artifact_timeout_ms = 30000

[rotation]
# Disable to always pair the instructor with the anchor persona
enabled = true

# A supporting persona appears in at most this many consecutive lessons
max_consecutive = 2

# Every Nth lesson features the anchor persona
anchor_frequency = 3

# Personas at or below this frequency rest floor(gap_numerator / frequency) lessons
low_frequency_threshold = 10
gap_numerator = 20

# Weight multiplier when a persona's traits suit the lesson phase
relevance_boost = 1.5

# Fixed seed for reproducible casts
# seed = 42

[voice]
# Tone intensity from 1 (restrained) to 10 (theatrical)
intensity = 7

# Rendered responses kept in the response cache
cache_size = 1000

[artifact]
# Produce an illustration for every lesson
enabled = true

# Cached illustrations expire after this many seconds (7 days)
ttl_secs = 604800

# Maximum cached illustrations
max_entries = 100

# Cache backend: memory or file
store = "memory"

# Directory for the file store
cache_dir = "~/.tutor-engine/artifacts"

# Budget for one provider call (milliseconds), also the HTTP client timeout
provider_timeout_ms = 25000

[provider]
# Without a provider every illustration is a four-panel text comic
enabled = false

# openai or mock
kind = "openai"

base_url = "https://api.openai.com/v1"

# Prefer TUTOR_PROVIDER_API_KEY over storing the key here
api_key = ""

model = "dall-e-3"
size = "1024x1024"
quality = "standard"
style = "vivid"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.tutor-engine/logs/tutor.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = TutorConfig::default();
        assert_eq!(config.rotation.max_consecutive, 2);
        assert_eq!(config.rotation.anchor_frequency, 3);
        assert_eq!(config.voice.intensity, 7);
        assert_eq!(config.voice.cache_size, 1000);
        assert_eq!(config.artifact.ttl_secs, 604_800);
        assert_eq!(config.tutor.neutral_score, 7.0);
        assert!(!config.provider.is_configured());
    }

    #[test]
    fn test_generated_default_matches_defaults() {
        let parsed: TutorConfig = toml::from_str(generate_default_config()).unwrap();
        let defaults = TutorConfig::default();
        assert_eq!(parsed.rotation.max_consecutive, defaults.rotation.max_consecutive);
        assert_eq!(parsed.artifact.max_entries, defaults.artifact.max_entries);
        assert_eq!(parsed.artifact.store, StoreKind::Memory);
        assert_eq!(parsed.provider.kind, ProviderKind::OpenAi);
        assert_eq!(parsed.tutor.artifact_timeout_ms, defaults.tutor.artifact_timeout_ms);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        env::set_var("TUTOR_VOICE_INTENSITY", "3");
        env::set_var("TUTOR_ROTATION_SEED", "99");
        env::set_var("TUTOR_ARTIFACT_STORE", "FILE");
        env::set_var("TUTOR_PROVIDER_KIND", "mock");

        let mut config = TutorConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.voice.intensity, 3);
        assert_eq!(config.rotation.seed, Some(99));
        assert_eq!(config.artifact.store, StoreKind::File);
        assert_eq!(config.provider.kind, ProviderKind::Mock);

        env::remove_var("TUTOR_VOICE_INTENSITY");
        env::remove_var("TUTOR_ROTATION_SEED");
        env::remove_var("TUTOR_ARTIFACT_STORE");
        env::remove_var("TUTOR_PROVIDER_KIND");
    }

    #[test]
    fn test_unparseable_env_value_is_ignored() {
        env::set_var("TUTOR_ROTATION_MAX_CONSECUTIVE", "lots");
        let mut config = TutorConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.rotation.max_consecutive, 2);
        env::remove_var("TUTOR_ROTATION_MAX_CONSECUTIVE");
    }

    #[test]
    fn test_provider_configured_rules() {
        let mut provider = ProviderSettings {
            enabled: true,
            ..Default::default()
        };
        assert!(!provider.is_configured());
        provider.api_key = "sk-test".to_string();
        assert!(provider.is_configured());

        let mock = ProviderSettings {
            enabled: true,
            kind: ProviderKind::Mock,
            ..Default::default()
        };
        assert!(mock.is_configured());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = TutorConfig::default();
        config.voice.intensity = 11;
        assert!(config.validate().is_err());

        let mut config = TutorConfig::default();
        config.rotation.max_consecutive = 0;
        assert!(config.validate().is_err());

        let mut config = TutorConfig::default();
        config.tutor.neutral_score = 0.5;
        assert!(config.validate().is_err());

        let mut config = TutorConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_provider_url() {
        let mut config = TutorConfig::default();
        config.provider.base_url = "ftp://images.example.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scheme"));

        config.provider.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.provider.base_url = "http://localhost:8080/v1".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = TutorConfig::default();
        config.artifact.cache_dir = "~/tutor/cache".to_string();
        config.expand_paths();
        assert!(!config.artifact.cache_dir.contains('~'));
    }

    #[test]
    fn test_parse_partial_file() {
        let config_str = r#"
[rotation]
max_consecutive = 1
seed = 7

[artifact]
store = "file"
cache_dir = "/tmp/tutor-artifacts"

[provider]
enabled = true
kind = "mock"
"#;
        let config: TutorConfig = toml::from_str(config_str).unwrap();
        assert_eq!(config.rotation.max_consecutive, 1);
        assert_eq!(config.rotation.anchor_frequency, 3);
        assert_eq!(config.rotation.seed, Some(7));
        assert_eq!(config.artifact.store, StoreKind::File);
        assert!(config.provider.is_configured());
        assert_eq!(config.voice.cache_size, 1000);
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tutor.toml");
        let path_str = path.to_string_lossy().to_string();

        let written = init_config(Some(&path_str), false).unwrap();
        assert_eq!(written, path);
        assert!(init_config(Some(&path_str), false).is_err());
        assert!(init_config(Some(&path_str), true).is_ok());
    }

    #[test]
    fn test_explicit_missing_file_is_not_found() {
        let err = TutorConfig::load(Some("/definitely/not/here/tutor.toml")).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigNotFound);
    }
}
