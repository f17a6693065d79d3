//! Error types for the tutor engine
//!
//! Only configuration, IO and bundled-data problems surface to callers.
//! Everything that happens while a lesson is being produced is recovered
//! inside the pipeline, so the provider, store and stage variants below are
//! mostly seen in logs.
//!
//! Provides:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for the CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Image provider errors (3xx)
    ProviderRequest = 300,
    ProviderTimeout = 301,
    ProviderResponse = 302,

    // Bundled data errors (4xx)
    DataParse = 400,
    DataInvalid = 401,
    TemplateInvalid = 402,

    // Pipeline errors (5xx)
    LessonNotFound = 500,
    CurriculumUnavailable = 501,
    StageFailed = 502,
    StoreUnavailable = 503,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Image Provider Errors
    // ─────────────────────────────────────────────────────────────

    /// The request never produced an HTTP response
    #[error("Image provider {provider} request failed: {message}")]
    ProviderRequest { provider: String, message: String },

    #[error("Image provider {provider} timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    /// Non-2xx status or an unusable body
    #[error("Image provider {provider} returned an unusable response: {message}")]
    ProviderResponse {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Bundled Data Errors
    // ─────────────────────────────────────────────────────────────

    /// A bundled or user-supplied data file could not be parsed
    #[error("Failed to parse {source_name}: {message}")]
    DataParse { source_name: String, message: String },

    /// Data parsed but violates a structural rule
    #[error("Invalid {what}: {message}")]
    DataInvalid { what: String, message: String },

    #[error("Invalid template for {intent}: {message}")]
    TemplateInvalid { intent: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Lesson {lesson_number} is not part of the curriculum")]
    LessonNotFound { lesson_number: u32 },

    #[error("Curriculum unavailable: {0}")]
    Curriculum(String),

    #[error("Stage {stage} failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("Artifact store {store} unavailable: {message}")]
    Store { store: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::DataParse,

            Error::ProviderRequest { .. } => ErrorCode::ProviderRequest,
            Error::ProviderTimeout { .. } => ErrorCode::ProviderTimeout,
            Error::ProviderResponse { .. } => ErrorCode::ProviderResponse,

            Error::DataParse { .. } => ErrorCode::DataParse,
            Error::DataInvalid { .. } => ErrorCode::DataInvalid,
            Error::TemplateInvalid { .. } => ErrorCode::TemplateInvalid,

            Error::LessonNotFound { .. } => ErrorCode::LessonNotFound,
            Error::Curriculum(_) => ErrorCode::CurriculumUnavailable,
            Error::StageFailed { .. } => ErrorCode::StageFailed,
            Error::Store { .. } => ErrorCode::StoreUnavailable,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Transient failures a caller could reasonably try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ProviderRequest { .. }
                | Error::ProviderTimeout { .. }
                | Error::Store { .. }
                | Error::Io(_)
                | Error::IoRead { .. }
                | Error::IoWrite { .. }
        ) || matches!(self, Error::ProviderResponse { status: Some(s), .. } if *s == 429 || *s >= 500)
    }

    /// Errors that should stop the process at startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::DataParse { .. }
                | Error::DataInvalid { .. }
                | Error::TemplateInvalid { .. }
                | Error::Internal(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'tutor-engine config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'tutor-engine config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values.",
            ),
            Error::ProviderTimeout { .. } => Some(
                "Raise 'artifact.provider_timeout_ms' or check that the provider endpoint is reachable.",
            ),
            Error::ProviderResponse { status: Some(401), .. } => Some(
                "The provider rejected the API key. Set TUTOR_PROVIDER_API_KEY to a valid key.",
            ),
            Error::LessonNotFound { .. } => Some(
                "Lessons are numbered 1 to 60. Pass a lesson number inside that range.",
            ),
            Error::Store { .. } => Some(
                "Check that 'artifact.cache_dir' exists and is writable, or switch to the memory store.",
            ),
            Error::DataParse { .. } | Error::DataInvalid { .. } | Error::TemplateInvalid { .. } => {
                Some("A bundled data file is malformed. Rebuild from a clean checkout.")
            }
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn data_parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::DataParse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn data_invalid(what: impl Into<String>, message: impl Into<String>) -> Self {
        Error::DataInvalid {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn provider_request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderRequest {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn provider_response(
        provider: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Error::ProviderResponse {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    pub fn stage_failed(stage: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::StageFailed {
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::ProviderTimeout.as_str(), "E301");
        assert_eq!(ErrorCode::LessonNotFound.as_str(), "E500");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigValidation.exit_code(), 10);
        assert_eq!(ErrorCode::IoWrite.exit_code(), 20);
        assert_eq!(ErrorCode::ProviderRequest.exit_code(), 30);
        assert_eq!(ErrorCode::TemplateInvalid.exit_code(), 40);
        assert_eq!(ErrorCode::StoreUnavailable.exit_code(), 50);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_error_display() {
        let err = Error::LessonNotFound { lesson_number: 61 };
        assert!(err.to_string().contains("61"));

        let err = Error::config_not_found("/path/to/tutor.toml");
        assert!(err.to_string().contains("/path/to/tutor.toml"));
    }

    #[test]
    fn test_retryable_provider_statuses() {
        assert!(Error::provider_request("openai", "connection reset").is_retryable());
        assert!(Error::provider_response("openai", Some(503), "busy").is_retryable());
        assert!(Error::provider_response("openai", Some(429), "slow down").is_retryable());
        assert!(!Error::provider_response("openai", Some(400), "bad prompt").is_retryable());
        assert!(!Error::config_validation("bad").is_retryable());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::config_validation("bad").is_fatal());
        assert!(Error::data_invalid("persona pool", "no instructor").is_fatal());
        assert!(!Error::store("file", "disk full").is_fatal());
        assert!(!Error::LessonNotFound { lesson_number: 0 }.is_fatal());
    }

    #[test]
    fn test_suggestions() {
        let hint = Error::config_not_found("/x").suggestion().unwrap_or_default();
        assert!(hint.contains("config init"));

        let hint = Error::provider_response("openai", Some(401), "denied")
            .suggestion()
            .unwrap_or_default();
        assert!(hint.contains("TUTOR_PROVIDER_API_KEY"));

        assert!(Error::Internal("boom".into()).suggestion().is_none());
    }

    #[test]
    fn test_format_for_terminal() {
        let formatted = Error::config_not_found("/test/tutor.toml").format_for_terminal();
        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let formatted = Error::stage_failed("explanation", "no pool").format_for_log();
        assert!(formatted.contains("[E502]"));
        assert!(formatted.contains("explanation"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::IoPermission);
    }
}
