//! Command-line interface definition for Calchat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat and one-shot prompts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Calchat - calendar assistant CLI
///
/// Drive a calendar through natural-language chat or a scanned image,
/// backed by a local generative text model.
#[derive(Parser, Debug, Clone)]
#[command(name = "calchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Override the generation server host from config
    #[arg(long, env = "CALCHAT_HOST")]
    pub host: Option<String>,

    /// Override the generation model from config
    #[arg(short, long, env = "CALCHAT_MODEL")]
    pub model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Calchat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start interactive chat mode with the assistant
    Chat,

    /// Run a single turn and print the assistant's reply
    Ask {
        /// The prompt to submit
        prompt: String,
    },

    /// Extract event details from a scanned image
    Scan {
        /// Path to the image file
        image: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
