//! Calchat - calendar assistant CLI
//!
//! Main entry point for the calchat binary.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use calchat::cli::{Cli, Commands};
use calchat::commands;
use calchat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat => {
            tracing::info!("Starting interactive chat session");
            commands::chat::run_chat(config).await?;
            Ok(())
        }
        Commands::Ask { prompt } => {
            tracing::info!("Running one-shot prompt");
            commands::ask::run_ask(config, prompt).await?;
            Ok(())
        }
        Commands::Scan { image } => {
            tracing::info!("Scanning image: {}", image.display());
            commands::scan::run_scan(config, image).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "calchat=debug" } else { "calchat=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
