//! Error types for Calchat
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Calchat operations
///
/// This enum encompasses all possible errors that can occur during
/// turn orchestration, generation streaming, calendar access, text
/// recognition, and configuration loading.
#[derive(Error, Debug)]
pub enum CalchatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The generation session has no model/session available yet
    #[error("Generation session is not ready")]
    SessionNotReady,

    /// Generation failed mid-stream or the generation endpoint errored
    #[error("Generation error: {0}")]
    Generation(String),

    /// Calendar store errors (query or mutation failures)
    #[error("Calendar error: {0}")]
    Calendar(String),

    /// Text recognition errors (image decoding, recognition backend)
    #[error("Recognition error: {0}")]
    Recognition(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Calchat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = CalchatError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_session_not_ready_display() {
        let error = CalchatError::SessionNotReady;
        assert_eq!(error.to_string(), "Generation session is not ready");
    }

    #[test]
    fn test_generation_error_display() {
        let error = CalchatError::Generation("stream closed".to_string());
        assert_eq!(error.to_string(), "Generation error: stream closed");
    }

    #[test]
    fn test_calendar_error_display() {
        let error = CalchatError::Calendar("save failed".to_string());
        assert_eq!(error.to_string(), "Calendar error: save failed");
    }

    #[test]
    fn test_recognition_error_display() {
        let error = CalchatError::Recognition("unreadable image".to_string());
        assert_eq!(error.to_string(), "Recognition error: unreadable image");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: CalchatError = io_error.into();
        assert!(matches!(error, CalchatError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_str = "{invalid json}";
        let json_error = serde_json::from_str::<serde_json::Value>(json_str).unwrap_err();
        let error: CalchatError = json_error.into();
        assert!(matches!(error, CalchatError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_str = "invalid: : yaml";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: CalchatError = yaml_error.into();
        assert!(matches!(error, CalchatError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CalchatError>();
    }
}
