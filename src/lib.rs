//! tubedigest - YouTube summaries with deep search
//!
//! Fetches a video's transcript, summarizes it with a local (Ollama) or hosted
//! (OpenAI-compatible) language model, extracts the main topic and searches
//! the web for related sources, which the model normalizes into a list.
//!
//! # Architecture
//!
//! - `config` - Strictly validated TOML settings and prompt templates
//! - `backend` - Backend trait, Ollama and OpenAI implementations, resolver
//! - `sources` - Transcript (yt-dlp) and web search (DuckDuckGo) sources
//! - `pipeline` - Typed stage chains and the three session pipelines
//! - `execution` - Fault boundary: probe, run, classify failures
//! - `session` - Facade used by the CLI and HTTP server
//! - `results` - Parsing of normalized search records
//!
//! # Example
//!
//! ```rust,no_run
//! use tubedigest::config::Settings;
//! use tubedigest::session::Session;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load_default()?;
//!     let session = Session::new(settings)?;
//!
//!     let summary = session.summarize("https://youtu.be/dQw4w9WgXcQ").await;
//!     let (topic, sources) = session.extract_topic_then_deep_search(&summary).await;
//!     println!("{}\n\n{}\n{}", summary, topic, sources);
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod pipeline;
pub mod results;
pub mod session;
pub mod sources;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AppError, Result};
