//! Execution boundary.
//!
//! [`run`] is the only place pipeline failures are caught. It probes local
//! backends before doing any work, runs the pipeline, and folds every error
//! (including panics) into a closed [`FailureKind`] taxonomy so the
//! presentation layer always receives either the pipeline output or a
//! readable diagnostic.

use crate::backend::{Backend, Reachability};
use crate::error::AppError;
use crate::pipeline::Pipeline;
use futures::FutureExt;
use regex::Regex;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;
use tracing::{error, info, instrument, warn};

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConfigError,
    BackendUnavailable,
    ConnectionRefused,
    MalformedOutput,
    TemplateError,
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::ConfigError => "configuration error",
            FailureKind::BackendUnavailable => "backend unavailable",
            FailureKind::ConnectionRefused => "connection refused",
            FailureKind::MalformedOutput => "malformed output",
            FailureKind::TemplateError => "template error",
            FailureKind::Unknown => "unexpected error",
        };
        write!(f, "{}", label)
    }
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Stage that failed; `None` for pre-flight failures and panics.
    pub stage: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stage: None,
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FailureKind::BackendUnavailable => write!(f, "⚠️ {}", self.message),
            FailureKind::ConnectionRefused => write!(
                f,
                "⚠️ Connection refused while generating: {}. \
                 The model backend stopped accepting connections; start it again and retry.",
                self.message
            ),
            FailureKind::MalformedOutput => {
                write!(f, "⚠️ The model returned unusable output: {}", self.message)
            }
            FailureKind::TemplateError => write!(
                f,
                "⚠️ Internal prompt template error: {}. Please report this.",
                self.message
            ),
            FailureKind::ConfigError => write!(f, "⚠️ Configuration error: {}", self.message),
            FailureKind::Unknown => match &self.stage {
                Some(stage) => write!(f, "⚠️ Error in `{}`: {}", stage, self.message),
                None => write!(f, "⚠️ Error: {}", self.message),
            },
        }
    }
}

/// Either the pipeline output or a classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(T),
    Failure(Failure),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure.kind),
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }
}

impl Outcome<String> {
    /// The output itself, or the rendered diagnostic.
    pub fn into_display(self) -> String {
        match self {
            Outcome::Success(text) => text,
            Outcome::Failure(failure) => failure.to_string(),
        }
    }
}

fn refused_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)connection refused|econnrefused|actively refused|failed to connect|error trying to connect|os error 111|os error 10061",
        )
        .expect("Invalid regex")
    })
}

/// Whether an error message describes a refused connection.
pub fn looks_refused(message: &str) -> bool {
    refused_regex().is_match(message)
}

/// Map an error to its failure category.
///
/// `during_generation` marks errors raised by the backend call; only those
/// can be connection refusals.
pub fn classify(error: &AppError, during_generation: bool) -> FailureKind {
    match error {
        AppError::Config { .. } => FailureKind::ConfigError,
        AppError::Template { .. } => FailureKind::TemplateError,
        AppError::MalformedOutput(_) | AppError::Json(_) => FailureKind::MalformedOutput,
        AppError::Http(e) if e.is_decode() => FailureKind::MalformedOutput,
        AppError::Connection(_) if during_generation => FailureKind::ConnectionRefused,
        AppError::Http(e) if during_generation && e.is_connect() => FailureKind::ConnectionRefused,
        other if during_generation && looks_refused(&other.to_string()) => {
            FailureKind::ConnectionRefused
        }
        _ => FailureKind::Unknown,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "a pipeline stage panicked".to_string()
    }
}

/// Run `pipeline` on `input` behind the fault boundary.
#[instrument(skip_all, fields(pipeline = pipeline.name()))]
pub async fn run<I, O>(pipeline: &Pipeline<I, O>, input: I, backend: &dyn Backend) -> Outcome<O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    if let Reachability::Unreachable {
        endpoint,
        reason,
        hint,
    } = backend.probe().await
    {
        warn!("Backend at {} is unreachable: {}", endpoint, reason);
        return Outcome::Failure(Failure::new(
            FailureKind::BackendUnavailable,
            format!(
                "The local model backend is not running at {} ({}). {}",
                endpoint, reason, hint
            ),
        ));
    }

    match AssertUnwindSafe(pipeline.run(input)).catch_unwind().await {
        Ok(Ok(output)) => {
            info!("Pipeline `{}` succeeded", pipeline.name());
            Outcome::Success(output)
        }
        Ok(Err(stage_error)) => {
            let kind = classify(&stage_error.source, stage_error.calls_backend);
            warn!(
                "Pipeline `{}` failed in `{}` ({}): {}",
                pipeline.name(),
                stage_error.stage,
                kind,
                stage_error.source
            );
            Outcome::Failure(Failure {
                kind,
                message: stage_error.source.to_string(),
                stage: Some(stage_error.stage),
            })
        }
        Err(payload) => {
            let message = panic_message(payload);
            error!("Pipeline `{}` panicked: {}", pipeline.name(), message);
            Outcome::Failure(Failure::new(FailureKind::Unknown, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OllamaBackend;
    use crate::pipeline::{FnStage, GenerateStage, PipelineBuilder};
    use crate::test_support::{closed_port_url, spawn_server, MockBackend};
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::Arc;

    fn generate_only(backend: Arc<dyn Backend>) -> Pipeline<String, String> {
        PipelineBuilder::start("generate-only", GenerateStage::new(backend)).build()
    }

    #[test]
    fn test_classify_closed_taxonomy() {
        let cases = [
            (AppError::config("llm.model", "missing"), false, FailureKind::ConfigError),
            (
                AppError::Template {
                    template: "summary".into(),
                    key: "transcript".into(),
                },
                false,
                FailureKind::TemplateError,
            ),
            (AppError::MalformedOutput("bad json".into()), true, FailureKind::MalformedOutput),
            (AppError::Connection("refused".into()), true, FailureKind::ConnectionRefused),
            (AppError::Source("no transcript".into()), false, FailureKind::Unknown),
            (AppError::InvalidInput("blank".into()), false, FailureKind::Unknown),
        ];

        for (error, during_generation, expected) in cases {
            assert_eq!(classify(&error, during_generation), expected, "{error}");
        }
    }

    #[test]
    fn test_refused_messages_during_generation_never_unknown() {
        let messages = [
            "Connection refused (os error 111)",
            "error sending request: error trying to connect: tcp connect error",
            "ECONNREFUSED 127.0.0.1:11434",
            "No connection could be made because the target machine actively refused it. (os error 10061)",
            "Failed to connect to localhost port 11434",
        ];

        for message in messages {
            let error = AppError::Backend(message.to_string());
            assert_eq!(classify(&error, true), FailureKind::ConnectionRefused, "{message}");
            assert_eq!(classify(&error, false), FailureKind::Unknown, "{message}");
        }
    }

    #[tokio::test]
    async fn test_unreachable_probe_skips_pipeline() {
        let backend = Arc::new(MockBackend::fixed("never").unreachable("http://localhost:11434"));
        let pipeline = generate_only(backend.clone());

        let outcome = run(&pipeline, "prompt".to_string(), backend.as_ref()).await;
        assert_eq!(outcome.kind(), Some(FailureKind::BackendUnavailable));
        assert!(backend.prompts().is_empty());

        let text = outcome.into_display();
        assert!(text.contains("not running at http://localhost:11434"));
        assert!(text.contains("ollama serve"));
    }

    #[tokio::test]
    async fn test_non_200_probe_from_real_backend() {
        let router = Router::new().route("/", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = spawn_server(router).await;
        let backend: Arc<dyn Backend> = Arc::new(OllamaBackend::new(&base, "llama3", 0.2));

        let outcome = run(&generate_only(backend.clone()), "p".to_string(), backend.as_ref()).await;
        assert_eq!(outcome.kind(), Some(FailureKind::BackendUnavailable));
    }

    #[tokio::test]
    async fn test_closed_port_probe_from_real_backend() {
        let base = closed_port_url().await;
        let backend: Arc<dyn Backend> = Arc::new(OllamaBackend::new(&base, "llama3", 0.2));

        let outcome = run(&generate_only(backend.clone()), "p".to_string(), backend.as_ref()).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::BackendUnavailable);
        assert!(failure.message.contains(&base));
    }

    #[tokio::test]
    async fn test_hosted_backend_is_not_probed_for_availability() {
        let backend = Arc::new(MockBackend::fixed("ok").hosted());
        let outcome = run(&generate_only(backend.clone()), "p".to_string(), backend.as_ref()).await;
        assert_eq!(outcome, Outcome::Success("ok".to_string()));
        assert_eq!(backend.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_success_output_is_unmodified() {
        let reply = "  [{\"title\": \"A\"}]\n";
        let backend = Arc::new(MockBackend::fixed(reply));
        let outcome = run(&generate_only(backend.clone()), "p".to_string(), backend.as_ref()).await;
        assert_eq!(outcome.success().as_deref(), Some(reply));
    }

    #[tokio::test]
    async fn test_refused_generation_is_classified() {
        let backend = Arc::new(MockBackend::failing(|| {
            AppError::Backend("tcp connect error: Connection refused (os error 111)".to_string())
        }));
        let outcome = run(&generate_only(backend.clone()), "p".to_string(), backend.as_ref()).await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ConnectionRefused);
        assert_eq!(failure.stage.as_deref(), Some("generate"));
    }

    #[tokio::test]
    async fn test_real_backend_dropping_generation_is_connection_refused() {
        // Probe against a reachable stand-in; generation targets a closed port.
        let base = closed_port_url().await;
        let backend = Arc::new(OllamaBackend::new(&base, "llama3", 0.2));
        let pipeline = generate_only(backend.clone());
        let reachable = Arc::new(MockBackend::fixed("unused"));

        let outcome = run(&pipeline, "p".to_string(), reachable.as_ref()).await;
        assert_eq!(outcome.kind(), Some(FailureKind::ConnectionRefused));
    }

    #[tokio::test]
    async fn test_panicking_stage_is_unknown() {
        let backend = Arc::new(MockBackend::panicking());
        let outcome = run(&generate_only(backend.clone()), "p".to_string(), backend.as_ref()).await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Unknown);
        assert!(failure.message.contains("backend exploded"));
    }

    #[tokio::test]
    async fn test_non_generation_failure_keeps_stage_name() {
        let backend = Arc::new(MockBackend::echo());
        let pipeline = PipelineBuilder::start(
            "fails-early",
            FnStage::new("fetch", |_: String| -> crate::error::Result<String> {
                Err(AppError::Source("connection refused by search".to_string()))
            }),
        )
        .then(GenerateStage::new(backend.clone()))
        .build();

        let outcome = run(&pipeline, "x".to_string(), backend.as_ref()).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Unknown);
        assert_eq!(failure.stage.as_deref(), Some("fetch"));
        assert!(outcome.clone().into_display().contains("Error in `fetch`"));
        assert!(backend.prompts().is_empty());
    }
}
