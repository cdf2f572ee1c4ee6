//! Session facade used by the presentation layer.
//!
//! A session owns the validated settings, the resolved backend and the three
//! pipelines. All of it is immutable, so one session can serve many requests.

use crate::backend::{resolve, Backend};
use crate::config::{Prompts, Settings};
use crate::error::Result;
use crate::execution::{self, Outcome};
use crate::pipeline::Pipelines;
use crate::sources::{DuckDuckGoSearch, SearchSource, TranscriptSource, YoutubeTranscripts};
use std::sync::Arc;
use tracing::{info, instrument};

/// Results text when the topic could not be extracted.
pub const DEEP_SEARCH_SKIPPED: &str = "Deep search was skipped because no topic could be extracted.";

pub struct Session {
    settings: Settings,
    backend: Arc<dyn Backend>,
    pipelines: Pipelines,
}

impl Session {
    /// Wire a session to YouTube transcripts and DuckDuckGo search.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.custom_prompt_dir().as_deref())?;
        let backend = resolve(&settings);
        let transcripts = Arc::new(YoutubeTranscripts::new());
        let search = Arc::new(DuckDuckGoSearch::new(
            settings.deep_search.max_results as usize,
        ));

        info!("Using backend {}", backend.descriptor());
        Ok(Self::with_components(
            settings,
            &prompts,
            backend,
            transcripts,
            search,
        ))
    }

    /// Wire a session to caller-supplied collaborators.
    pub fn with_components(
        settings: Settings,
        prompts: &Prompts,
        backend: Arc<dyn Backend>,
        transcripts: Arc<dyn TranscriptSource>,
        search: Arc<dyn SearchSource>,
    ) -> Self {
        let pipelines = Pipelines::build(&settings, prompts, backend.clone(), transcripts, search);
        Self {
            settings,
            backend,
            pipelines,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn pipelines(&self) -> &Pipelines {
        &self.pipelines
    }

    #[instrument(skip(self, url), fields(url_len = url.len()))]
    pub async fn summarize_outcome(&self, url: &str) -> Outcome<String> {
        execution::run(&self.pipelines.summarize, url.to_string(), self.backend()).await
    }

    #[instrument(skip(self, summary), fields(summary_len = summary.len()))]
    pub async fn extract_topic_outcome(&self, summary: &str) -> Outcome<String> {
        execution::run(&self.pipelines.extract_topic, summary.to_string(), self.backend()).await
    }

    #[instrument(skip(self, topic), fields(topic_len = topic.len()))]
    pub async fn deep_search_outcome(&self, topic: &str) -> Outcome<String> {
        execution::run(&self.pipelines.deep_search, topic.to_string(), self.backend()).await
    }

    /// Summary text, or a diagnostic describing why there is none.
    pub async fn summarize(&self, url: &str) -> String {
        self.summarize_outcome(url).await.into_display()
    }

    /// `(topic, results)`; both may be diagnostics.
    pub async fn extract_topic_then_deep_search(&self, summary: &str) -> (String, String) {
        match self.extract_topic_outcome(summary).await {
            Outcome::Success(topic) => {
                let topic = clean_topic(&topic);
                let results = self.deep_search_outcome(&topic).await.into_display();
                (topic, results)
            }
            Outcome::Failure(failure) => (failure.to_string(), DEEP_SEARCH_SKIPPED.to_string()),
        }
    }
}

/// Strip whitespace and wrapping quotes models like to add around a phrase.
fn clean_topic(topic: &str) -> String {
    topic
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}
