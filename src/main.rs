//! tubedigest CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tubedigest::cli::{commands, Cli, Commands};
use tubedigest::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tubedigest={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = match &cli.config {
        Some(path) => Settings::expand_path(path),
        None => Settings::default_config_path(),
    };

    match &cli.command {
        Commands::Summarize {
            url,
            deep_search,
            no_deep_search,
        } => {
            let settings = load_settings(&config_path)?;
            commands::run_summarize(url, *deep_search, *no_deep_search, settings).await?;
        }

        Commands::Serve { host, port } => {
            let settings = load_settings(&config_path)?;
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Doctor => {
            let settings = load_settings(&config_path)?;
            commands::run_doctor(&settings, &config_path).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &config_path)?;
        }
    }

    Ok(())
}

/// Configuration errors are fatal.
fn load_settings(path: &Path) -> Result<Settings> {
    Settings::load(path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}
