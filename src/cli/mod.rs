//! CLI module for tubedigest.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// tubedigest - YouTube summaries with deep search
///
/// Summarizes a video's transcript with a local or hosted language model,
/// then searches the web for related sources.
#[derive(Parser, Debug)]
#[command(name = "tubedigest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a YouTube video, then deep-search its topic
    Summarize {
        /// YouTube URL or video ID
        url: String,

        /// Run deep search even if disabled in the config
        #[arg(long, conflicts_with = "no_deep_search")]
        deep_search: bool,

        /// Skip deep search even if enabled in the config
        #[arg(long)]
        no_deep_search: bool,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Check backend, tools and configuration
    Doctor,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
