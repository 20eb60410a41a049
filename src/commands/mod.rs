/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `chat` - Interactive chat session with the assistant
- `ask`  - Run a single turn and print the reply
- `scan` - Extract event details from an image

These handlers are intentionally small and use the library components:
the orchestrator, the Ollama generator, and the calendar store.
*/

use crate::calendar::{CalendarEvent, MemoryCalendar};
use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::Config;
use crate::error::{CalchatError, Result};
use crate::generator::OllamaGenerator;
use crate::orchestrator::Orchestrator;
use crate::parser::ParsedEventData;
use crate::recognizer::SidecarRecognizer;
use crate::transcript::Role;

use colored::Colorize;
use std::sync::Arc;

// Special commands parser for the interactive session
pub mod special_commands;

/// Builds the assistant stack from configuration
///
/// Verifies the model is reachable before returning, so commands fail
/// fast with a connection error instead of mid-turn.
async fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let generator = OllamaGenerator::new(config.generator.clone())?;
    generator.load_model().await?;

    let calendar =
        MemoryCalendar::new().with_delete_window(config.assistant.delete_window_months as u32);

    Ok(Arc::new(Orchestrator::new(
        Arc::new(generator),
        Arc::new(calendar),
        Arc::new(SidecarRecognizer::new()),
        config.assistant.clone(),
    )))
}

fn print_event_draft(draft: &ParsedEventData) {
    println!("{}", "Staged event draft:".bold());
    println!("  Title:    {}", draft.title);
    println!("  Date:     {}", draft.date.format("%Y-%m-%d %H:%M"));
    println!("  Location: {}", draft.location);
    println!("  Notes:    {}", draft.notes);
}

fn print_upcoming(events: &[CalendarEvent]) {
    if events.is_empty() {
        println!("No upcoming events.");
        return;
    }
    for event in events {
        println!(
            "{}  {}",
            event.start.format("%Y-%m-%d %H:%M").to_string().cyan(),
            event.title
        );
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat session handler.
    //!
    //! Builds the orchestrator, then runs a readline loop that submits
    //! turns in the background while a renderer task prints finalized
    //! transcript entries as they land. Keeping submission off the
    //! readline task is what makes `/stop` reachable mid-generation.

    use super::*;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start an interactive chat session
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    ///
    /// # Errors
    ///
    /// Returns an error when the generation server is unreachable or
    /// the terminal cannot be initialized.
    pub async fn run_chat(config: Config) -> Result<()> {
        tracing::info!("Starting interactive chat session");

        let orchestrator = build_orchestrator(&config).await?;
        let renderer = spawn_renderer(orchestrator.clone());

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&config);

        loop {
            match rl.readline("you> ") {
                Ok(line) => {
                    let trimmed = line.trim().to_string();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(&trimmed)?;

                    match parse_special_command(&trimmed) {
                        Ok(SpecialCommand::Stop) => {
                            orchestrator.cancel();
                            continue;
                        }
                        Ok(SpecialCommand::Confirm) => {
                            confirm_staged(&orchestrator);
                            continue;
                        }
                        Ok(SpecialCommand::Discard) => {
                            discard_staged(&orchestrator);
                            continue;
                        }
                        Ok(SpecialCommand::ShowEvents) => {
                            print_upcoming(&orchestrator.upcoming_events());
                            continue;
                        }
                        Ok(SpecialCommand::AttachImage(path)) => {
                            if orchestrator.is_busy() {
                                print_busy_notice();
                            } else {
                                let orch = orchestrator.clone();
                                tokio::spawn(async move {
                                    orch.submit_image(path).await;
                                });
                            }
                            continue;
                        }
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::None) => {}
                        Err(e) => {
                            println!("{}", e.to_string().red());
                            continue;
                        }
                    }

                    if orchestrator.is_busy() {
                        print_busy_notice();
                        continue;
                    }
                    let orch = orchestrator.clone();
                    tokio::spawn(async move {
                        orch.submit_text(&trimmed, None).await;
                    });
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        orchestrator.cancel();
        renderer.abort();
        println!("Goodbye!");
        Ok(())
    }

    /// Prints finalized transcript entries as the orchestrator emits them
    fn spawn_renderer(orchestrator: Arc<Orchestrator>) -> tokio::task::JoinHandle<()> {
        let mut rx = orchestrator.subscribe();
        tokio::spawn(async move {
            let mut printed = 0usize;
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                while printed < snapshot.len() {
                    let entry = &snapshot[printed];
                    if entry.is_pending {
                        // Still streaming; wait for the finalized text
                        break;
                    }
                    match entry.role {
                        // The user already sees what they typed
                        Role::User => {}
                        Role::Assistant => {
                            println!("\n{} {}", "assistant>".green().bold(), entry.text)
                        }
                        Role::System => println!("\n{}", entry.text.red()),
                    }
                    printed += 1;
                }
            }
        })
    }

    fn confirm_staged(orchestrator: &Orchestrator) {
        if orchestrator.is_busy() {
            print_busy_notice();
            return;
        }
        if orchestrator.confirm_pending_event() || orchestrator.confirm_delete() {
            return;
        }
        println!("Nothing staged to confirm.");
    }

    fn discard_staged(orchestrator: &Orchestrator) {
        if orchestrator.is_busy() {
            print_busy_notice();
            return;
        }
        if orchestrator.discard_pending_event() || orchestrator.discard_delete() {
            return;
        }
        println!("Nothing staged to discard.");
    }

    fn print_busy_notice() {
        println!(
            "{}",
            "The assistant is still working; use /stop to interrupt it.".yellow()
        );
    }

    fn print_welcome_banner(config: &Config) {
        println!("{}", "Calchat - calendar assistant".bold());
        println!(
            "Model: {} @ {}",
            config.generator.model.cyan(),
            config.generator.host
        );
        println!("Type '/help' for commands, '/quit' to leave.\n");
    }
}

// One-shot prompt handler
pub mod ask {
    //! Single-turn handler.
    //!
    //! Runs one full turn and prints the assistant's reply. A turn
    //! that stages an event draft or deletion candidate prints the
    //! staged data instead of committing it; confirmation is an
    //! interactive-session concern.

    use super::*;

    /// Run a single turn and print the result
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `prompt` - The user's prompt text
    ///
    /// # Errors
    ///
    /// Returns an error when the server is unreachable or the turn is
    /// rejected.
    pub async fn run_ask(config: Config, prompt: String) -> Result<()> {
        tracing::info!("Running one-shot prompt");

        let orchestrator = build_orchestrator(&config).await?;
        if !orchestrator.submit_text(&prompt, None).await {
            return Err(CalchatError::Generation("Empty prompt".to_string()).into());
        }

        print_outcome(&orchestrator);
        Ok(())
    }

    pub(super) fn print_outcome(orchestrator: &Orchestrator) {
        for entry in orchestrator.entries() {
            match entry.role {
                Role::User => {}
                Role::Assistant => println!("{}", entry.text),
                Role::System => eprintln!("{}", entry.text.red()),
            }
        }

        if let Some(draft) = orchestrator.pending_event() {
            println!();
            print_event_draft(&draft);
            println!("(Use the chat command to confirm and save events.)");
        }
        if let Some(title) = orchestrator.delete_candidate() {
            println!();
            println!("Staged for deletion: {}", title.bold());
            println!("(Use the chat command to confirm deletions.)");
        }
    }
}

// Image scan handler
pub mod scan {
    //! Image intake handler.
    //!
    //! Runs the recognition and extraction flow on a single image and
    //! prints the staged event draft.

    use super::*;
    use std::path::PathBuf;

    /// Extract event details from an image
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `image` - Path to the image file
    ///
    /// # Errors
    ///
    /// Returns an error when the server is unreachable or the image
    /// path does not exist.
    pub async fn run_scan(config: Config, image: PathBuf) -> Result<()> {
        tracing::info!("Scanning image: {}", image.display());

        if !image.exists() {
            return Err(
                CalchatError::Recognition(format!("Image not found: {}", image.display())).into(),
            );
        }

        let orchestrator = build_orchestrator(&config).await?;
        orchestrator.submit_image(image).await;

        ask::print_outcome(&orchestrator);
        Ok(())
    }
}
