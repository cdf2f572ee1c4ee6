//! Summarize command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::execution::Outcome;
use crate::session::Session;
use anyhow::Result;

/// Decide whether to deep-search: explicit flags win over the config.
pub fn deep_search_enabled(force_on: bool, force_off: bool, configured: bool) -> bool {
    if force_on {
        true
    } else if force_off {
        false
    } else {
        configured
    }
}

/// Run the summarize command.
pub async fn run_summarize(
    url: &str,
    force_deep_search: bool,
    skip_deep_search: bool,
    settings: Settings,
) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        Output::warning("Please enter a valid URL.");
        anyhow::bail!("no URL given");
    }

    let deep_search = deep_search_enabled(
        force_deep_search,
        skip_deep_search,
        settings.deep_search.enabled,
    );
    let session = Session::new(settings)?;

    let spinner = Output::spinner("Fetching transcript and summarizing...");
    let outcome = session.summarize_outcome(url).await;
    spinner.finish_and_clear();

    let summary = match outcome {
        Outcome::Success(summary) => summary,
        Outcome::Failure(failure) => {
            Output::error(&failure.to_string());
            anyhow::bail!("summarization failed ({})", failure.kind);
        }
    };

    Output::header("Summary");
    println!("\n{}\n", summary.trim());

    if !deep_search {
        return Ok(());
    }

    let spinner = Output::spinner("Extracting topic and searching for sources...");
    let (topic, results) = session.extract_topic_then_deep_search(&summary).await;
    spinner.finish_and_clear();

    Output::header("Deep Search");
    Output::kv("Topic", &topic);
    println!();
    Output::search_results(&results);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_search_toggle() {
        assert!(deep_search_enabled(true, false, false));
        assert!(!deep_search_enabled(false, true, true));
        assert!(deep_search_enabled(false, false, true));
        assert!(!deep_search_enabled(false, false, false));
    }

    #[tokio::test]
    async fn test_blank_url_is_rejected() {
        let err = run_summarize("   ", false, false, crate::test_support::settings())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no URL given");
    }
}
