//! Shared fixtures for unit tests: settings, mock collaborators and local
//! HTTP servers.

use crate::backend::{Backend, BackendDescriptor, Reachability};
use crate::config::{Provider, Settings};
use crate::error::{AppError, Result};
use crate::sources::{SearchSource, TranscriptDocument, TranscriptSource};
use async_trait::async_trait;
use std::sync::Mutex;

pub const SETTINGS_TOML: &str = r#"
[llm]
provider = "local"
model = "llama3"
temperature = 0.2

[hosted]
model = "gpt-4o-mini"

[video]
add_video_info = true

[deep_search]
enabled = true
max_results = 5
highlight_video_sources = true
"#;

pub fn settings() -> Settings {
    Settings::from_toml_str(SETTINGS_TOML).unwrap()
}

/// Serve `router` on an ephemeral local port; returns its base URL.
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A local URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

type Responder = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Backend stand-in that records every prompt it is given.
pub struct MockBackend {
    provider: Provider,
    reachability: Reachability,
    respond: Responder,
    prompts: Mutex<Vec<String>>,
    probes: Mutex<usize>,
}

impl MockBackend {
    fn with_responder(respond: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            provider: Provider::Local,
            reachability: Reachability::Reachable,
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
            probes: Mutex::new(0),
        }
    }

    /// Replies with the text after the last `Transcript:` marker, or the whole prompt.
    pub fn echo() -> Self {
        Self::with_responder(|prompt: &str| {
            Ok(prompt
                .rsplit_once("Transcript:\n")
                .map(|(_, rest)| rest)
                .unwrap_or(prompt)
                .trim()
                .to_string())
        })
    }

    pub fn fixed(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::with_responder(move |_: &str| Ok(reply.clone()))
    }

    pub fn failing(make_error: impl Fn() -> AppError + Send + Sync + 'static) -> Self {
        Self::with_responder(move |_: &str| Err(make_error()))
    }

    pub fn panicking() -> Self {
        Self::with_responder(|_: &str| panic!("backend exploded"))
    }

    pub fn unreachable(mut self, endpoint: &str) -> Self {
        self.reachability = Reachability::Unreachable {
            endpoint: endpoint.to_string(),
            reason: "connection refused".to_string(),
            hint: "Start it with `ollama serve`.".to_string(),
        };
        self
    }

    pub fn hosted(mut self) -> Self {
        self.provider = Provider::Hosted;
        self.reachability = Reachability::NotRequired;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn probe_count(&self) -> usize {
        *self.probes.lock().unwrap()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            provider: self.provider,
            model: "mock".to_string(),
            temperature: 0.0,
            endpoint: None,
        }
    }

    async fn probe(&self) -> Reachability {
        *self.probes.lock().unwrap() += 1;
        self.reachability.clone()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.respond)(prompt)
    }
}

/// Transcript source returning canned documents.
pub struct MockTranscripts {
    documents: Vec<TranscriptDocument>,
    calls: Mutex<Vec<(String, bool)>>,
}

impl MockTranscripts {
    pub fn with_text(text: &str) -> Self {
        Self {
            documents: vec![TranscriptDocument {
                text: text.to_string(),
                metadata: None,
            }],
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            documents: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(url, include_metadata)` for every fetch, in order.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptSource for MockTranscripts {
    async fn fetch(&self, url: &str, include_metadata: bool) -> Result<Vec<TranscriptDocument>> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), include_metadata));
        Ok(self.documents.clone())
    }
}

/// Search source returning a canned blob.
pub struct MockSearch {
    results: String,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn with_results(results: &str) -> Self {
        Self {
            results: results.to_string(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchSource for MockSearch {
    async fn search(&self, query: &str) -> Result<String> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.results.clone())
    }
}
