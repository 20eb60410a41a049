//! Calchat - calendar assistant CLI library
//!
//! This library provides the core functionality for the Calchat
//! assistant: the conversation orchestrator, streaming generation,
//! text parsers, calendar storage, and configuration.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `orchestrator`: The turn state machine driving the conversation
//! - `generator`: Streaming text generation (Ollama) and cancellation
//! - `parser`: Date/range and event-field extraction from model output
//! - `calendar`: Calendar store trait and in-memory implementation
//! - `recognizer`: Best-effort text recognition for scanned images
//! - `transcript`: Observable chat transcript model
//! - `prompts`: Prompt templates for each flow step
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use calchat::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = calchat::cli::Cli::parse_args();
//!     let config = Config::load("config/config.yaml", &cli)?;
//!     config.validate()?;
//!
//!     // Orchestrator usage would go here
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod recognizer;
pub mod transcript;

// Re-export commonly used types
pub use calendar::{CalendarEvent, CalendarStore, MemoryCalendar};
pub use config::Config;
pub use error::{CalchatError, Result};
pub use generator::{GenerationHandle, Generator, OllamaGenerator};
pub use orchestrator::{Intent, Orchestrator, TurnState};
pub use parser::{parse_date_or_range, parse_event_fields, ParsedEventData};
pub use transcript::{Role, Transcript, TranscriptEntry};
