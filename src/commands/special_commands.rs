//! Special commands parser for interactive chat mode
//!
//! This module parses special commands entered during interactive chat
//! sessions. Special commands let users:
//! - Attach an image for event extraction
//! - Stop an in-flight generation
//! - Confirm or discard a staged event draft or deletion
//! - List upcoming events
//! - Display help information
//! - Exit the session
//!
//! Commands are prefixed with `/` and are case-insensitive; the image
//! path argument keeps its original case.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These commands act on the session rather than being sent through
/// the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Scan an image and stage the extracted event for confirmation
    AttachImage(PathBuf),

    /// Stop the in-flight generation
    Stop,

    /// Confirm the staged event draft or deletion candidate
    Confirm,

    /// Discard the staged event draft or deletion candidate
    Discard,

    /// List upcoming calendar events
    ShowEvents,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be submitted as a regular turn.
    None,
}

/// Parse a potential special command from user input
///
/// # Arguments
///
/// * `input` - Raw line entered by the user
///
/// # Errors
///
/// Returns a `CommandError` for a `/`-prefixed line that is not a
/// recognized command or is missing a required argument.
///
/// # Examples
///
/// ```
/// use calchat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/stop").unwrap();
/// assert_eq!(cmd, SpecialCommand::Stop);
///
/// let cmd = parse_special_command("what's on tomorrow?").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // If input doesn't start with "/", it's not a command (except exit/quit)
    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    match lower.as_str() {
        "/stop" => Ok(SpecialCommand::Stop),
        "/confirm" | "/yes" => Ok(SpecialCommand::Confirm),
        "/discard" | "/no" => Ok(SpecialCommand::Discard),
        "/events" => Ok(SpecialCommand::ShowEvents),
        "/help" => Ok(SpecialCommand::Help),
        "/quit" | "/exit" | "exit" | "quit" => Ok(SpecialCommand::Exit),

        "/image" => Err(CommandError::MissingArgument {
            command: "/image".to_string(),
            usage: "/image <path>".to_string(),
        }),
        _ if lower.starts_with("/image ") => {
            // Take the path from the original input to preserve case
            let path = trimmed[7..].trim();
            Ok(SpecialCommand::AttachImage(PathBuf::from(path)))
        }

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print help information for all special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

TURNS:
  Type anything else to ask about your schedule, create an
  event, or delete one. The assistant figures out which.

IMAGES:
  /image <path>   - Scan an image and extract event details

GENERATION:
  /stop           - Stop the current generation

CONFIRMATION:
  /confirm        - Save the staged event / perform the staged deletion
  /discard        - Throw away the staged event or deletion

CALENDAR:
  /events         - List upcoming events

SESSION:
  /help           - Show this help
  /quit  (/exit)  - Leave the session
"#
    );
}
