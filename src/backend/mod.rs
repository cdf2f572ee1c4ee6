//! Language-model backends.
//!
//! Callers depend only on the [`Backend`] capability. [`resolve`] picks the
//! concrete implementation once, from the configured provider, and captures
//! only that provider's parameters.

mod ollama;
mod openai;

pub use ollama::{OllamaBackend, PROBE_TIMEOUT};
pub use openai::OpenAIBackend;

use crate::config::{Provider, Settings};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// The parameters a backend handle actually captured.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendDescriptor {
    pub provider: Provider,
    pub model: String,
    pub temperature: f64,
    /// Base endpoint, when one is configured.
    pub endpoint: Option<String>,
}

impl std::fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, temperature {})",
            self.provider, self.model, self.temperature
        )?;
        if let Some(endpoint) = &self.endpoint {
            write!(f, " @ {}", endpoint)?;
        }
        Ok(())
    }
}

/// Result of a pre-flight reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    /// The backend has no probe (hosted APIs).
    NotRequired,
    Reachable,
    Unreachable {
        endpoint: String,
        reason: String,
        /// Operator guidance for bringing the backend up.
        hint: String,
    },
}

/// Text generation capability.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Parameters captured at construction.
    fn descriptor(&self) -> BackendDescriptor;

    /// Which provider this handle talks to.
    fn kind(&self) -> Provider {
        self.descriptor().provider
    }

    /// Cheap connectivity check performed before running a pipeline.
    async fn probe(&self) -> Reachability {
        Reachability::NotRequired
    }

    /// Generate text for a fully rendered prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the backend handle selected by `settings.llm.provider`.
///
/// Performs no I/O; connectivity is checked lazily by the execution boundary.
pub fn resolve(settings: &Settings) -> Arc<dyn Backend> {
    match settings.llm.provider {
        Provider::Local => Arc::new(OllamaBackend::new(
            settings.local_base_url(),
            &settings.llm.model,
            settings.llm.temperature,
        )),
        Provider::Hosted => Arc::new(OpenAIBackend::new(
            &settings.hosted.model,
            settings.llm.temperature,
            settings.hosted.api_base.as_deref(),
        )),
    }
}

/// Map a transport-level HTTP failure onto the library error.
pub(crate) fn transport_error(err: reqwest::Error, backend: &str) -> AppError {
    if err.is_connect() {
        AppError::Connection(format!("{} connection refused: {}", backend, err))
    } else if err.is_decode() {
        AppError::MalformedOutput(format!("{} returned an unreadable body: {}", backend, err))
    } else if err.is_timeout() {
        AppError::Backend(format!("{} request timed out: {}", backend, err))
    } else {
        AppError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: Provider) -> Settings {
        let mut settings = crate::test_support::settings();
        settings.llm.provider = provider;
        settings.llm.model = "llama3".to_string();
        settings.llm.temperature = 0.3;
        settings.hosted.model = "gpt-4o-mini".to_string();
        settings
    }

    #[test]
    fn test_resolve_local_uses_local_parameters() {
        let backend = resolve(&settings(Provider::Local));
        let descriptor = backend.descriptor();
        assert_eq!(descriptor.provider, Provider::Local);
        assert_eq!(descriptor.model, "llama3");
        assert_eq!(descriptor.temperature, 0.3);
        assert_eq!(descriptor.endpoint.as_deref(), Some("http://localhost:11434"));
    }

    #[test]
    fn test_resolve_hosted_uses_hosted_parameters() {
        let backend = resolve(&settings(Provider::Hosted));
        let descriptor = backend.descriptor();
        assert_eq!(descriptor.provider, Provider::Hosted);
        assert_eq!(descriptor.model, "gpt-4o-mini");
        assert_eq!(descriptor.temperature, 0.3);
        assert_eq!(descriptor.endpoint, None);
    }

    #[test]
    fn test_switching_provider_never_mixes_parameters() {
        let local = resolve(&settings(Provider::Local)).descriptor();
        let hosted = resolve(&settings(Provider::Hosted)).descriptor();
        let local_again = resolve(&settings(Provider::Local)).descriptor();

        assert_ne!(local, hosted);
        assert_eq!(local, local_again);
        assert_ne!(hosted.model, "llama3");
        assert_ne!(local.model, "gpt-4o-mini");
    }

    #[test]
    fn test_resolve_honours_custom_local_endpoint() {
        let mut settings = settings(Provider::Local);
        settings.llm.base_url = Some("http://gpu-box:11434/".to_string());
        let descriptor = resolve(&settings).descriptor();
        assert_eq!(descriptor.endpoint.as_deref(), Some("http://gpu-box:11434"));
    }

    #[tokio::test]
    async fn test_hosted_backend_needs_no_probe() {
        let backend = resolve(&settings(Provider::Hosted));
        assert_eq!(backend.probe().await, Reachability::NotRequired);
    }
}
