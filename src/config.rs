//! Configuration management for Calchat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{CalchatError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Calchat
///
/// This structure holds all configuration needed for the assistant,
/// including the generation endpoint and orchestrator behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Text generation endpoint configuration
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Assistant behavior configuration
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Text generation endpoint configuration
///
/// Points at an Ollama-compatible server used for all single-shot
/// generation calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Generation server host
    #[serde(default = "default_generator_host")]
    pub host: String,

    /// Model to generate with
    #[serde(default = "default_generator_model")]
    pub model: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

fn default_generator_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_generator_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            host: default_generator_host(),
            model: default_generator_model(),
            timeout_seconds: default_request_timeout(),
        }
    }
}

/// Assistant behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// How many days ahead the upcoming-events view looks
    #[serde(default = "default_upcoming_window_days")]
    pub upcoming_window_days: i64,

    /// How many months ahead deletion-by-title searches
    #[serde(default = "default_delete_window_months")]
    pub delete_window_months: i64,

    /// Default duration for newly created events (minutes)
    #[serde(default = "default_event_duration_minutes")]
    pub event_duration_minutes: i64,
}

fn default_upcoming_window_days() -> i64 {
    30
}

fn default_delete_window_months() -> i64 {
    6
}

fn default_event_duration_minutes() -> i64 {
    60
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            upcoming_window_days: default_upcoming_window_days(),
            delete_window_months: default_delete_window_months(),
            event_duration_minutes: default_event_duration_minutes(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file with CLI overrides
    ///
    /// Missing files are not an error: defaults are used so the CLI
    /// works out of the box against a local generation server.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed CLI arguments whose overrides take precedence
    ///
    /// # Errors
    ///
    /// Returns `CalchatError::Yaml` if the file exists but cannot be parsed.
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path).map_err(CalchatError::Io)?;
            serde_yaml::from_str(&contents).map_err(CalchatError::Yaml)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", path);
            Self::default()
        };

        if let Some(host) = &cli.host {
            config.generator.host = host.clone();
        }
        if let Some(model) = &cli.model {
            config.generator.model = model.clone();
        }

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `CalchatError::Config` if any field is out of range or empty.
    pub fn validate(&self) -> Result<()> {
        if self.generator.host.is_empty() {
            return Err(CalchatError::Config("generator.host must not be empty".to_string()).into());
        }
        if !self.generator.host.starts_with("http://") && !self.generator.host.starts_with("https://")
        {
            return Err(CalchatError::Config(format!(
                "generator.host must be an http(s) URL, got: {}",
                self.generator.host
            ))
            .into());
        }
        if self.generator.model.is_empty() {
            return Err(
                CalchatError::Config("generator.model must not be empty".to_string()).into(),
            );
        }
        if self.generator.timeout_seconds == 0 {
            return Err(CalchatError::Config(
                "generator.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }
        if self.assistant.upcoming_window_days <= 0 {
            return Err(CalchatError::Config(
                "assistant.upcoming_window_days must be positive".to_string(),
            )
            .into());
        }
        if self.assistant.delete_window_months <= 0 {
            return Err(CalchatError::Config(
                "assistant.delete_window_months must be positive".to_string(),
            )
            .into());
        }
        if self.assistant.event_duration_minutes <= 0 {
            return Err(CalchatError::Config(
                "assistant.event_duration_minutes must be positive".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
