//! CLI output formatting utilities.

use crate::results::{parse_records, SourceRecord};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one deep-search record.
    pub fn source_record(record: &SourceRecord) {
        let marker = if record.highlight {
            style("*").yellow().bold()
        } else {
            style("*").cyan()
        };
        let kind = format!("{:?}", record.kind).to_lowercase();
        println!("  {} {} ({})", marker, style(&record.title).bold(), style(kind).dim());
        println!("    {}", style(&record.url).dim());

        let byline: Vec<&str> = [record.author.as_deref(), record.published_at.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !byline.is_empty() {
            println!("    {}", byline.join(", "));
        }
    }

    /// Print deep-search results: as records when they parse, raw otherwise.
    pub fn search_results(raw: &str) {
        match parse_records(raw) {
            Ok(records) if !records.is_empty() => {
                for record in &records {
                    Self::source_record(record);
                }
            }
            _ => println!("{}", raw.trim()),
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}
