//! Local inference backend talking to an Ollama server.

use super::{transport_error, Backend, BackendDescriptor, Reachability};
use crate::config::Provider;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Upper bound for the pre-flight reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound for a single generation call (5 minutes).
const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Ollama local LLM backend.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaBackend {
    /// Create a backend for `model` served at `base_url`.
    pub fn new(base_url: &str, model: &str, temperature: f64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        }
    }

    fn startup_hint(&self) -> String {
        format!(
            "Start it with `ollama serve` and make sure the model is available with `ollama pull {}`.",
            self.model
        )
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            provider: Provider::Local,
            model: self.model.clone(),
            temperature: self.temperature,
            endpoint: Some(self.base_url.clone()),
        }
    }

    #[instrument(skip(self), fields(endpoint = %self.base_url))]
    async fn probe(&self) -> Reachability {
        let url = format!("{}/", self.base_url);
        let unreachable = |reason: String| Reachability::Unreachable {
            endpoint: self.base_url.clone(),
            reason,
            hint: self.startup_hint(),
        };

        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                debug!("Ollama is reachable");
                Reachability::Reachable
            }
            Ok(response) => unreachable(format!("health check returned {}", response.status())),
            Err(e) if e.is_timeout() => unreachable(format!(
                "no answer within {} ms",
                PROBE_TIMEOUT.as_millis()
            )),
            Err(e) => unreachable(e.to_string()),
        }
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(GENERATE_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, "Ollama"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, "Ollama"))?;

        if !status.is_success() {
            if status == reqwest::StatusCode::NOT_FOUND && body.contains("not found") {
                return Err(AppError::Backend(format!(
                    "model `{}` is not available locally; run `ollama pull {}`",
                    self.model, self.model
                )));
            }
            return Err(AppError::Backend(format!(
                "Ollama returned {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::MalformedOutput(format!("unexpected Ollama response: {}", e))
        })?;

        debug!("Generated {} characters", parsed.response.len());
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port_url, spawn_server};
    use axum::{http::StatusCode, routing::get, routing::post, Json, Router};

    #[test]
    fn test_ollama_backend_descriptor() {
        let backend = OllamaBackend::new("http://localhost:11434/", "codellama", 0.1);
        let descriptor = backend.descriptor();
        assert_eq!(descriptor.model, "codellama");
        assert_eq!(descriptor.endpoint.as_deref(), Some("http://localhost:11434"));
    }

    #[tokio::test]
    async fn test_probe_reachable_on_200() {
        let url = spawn_server(Router::new().route("/", get(|| async { "Ollama is running" }))).await;
        let backend = OllamaBackend::new(&url, "llama3", 0.2);
        assert_eq!(backend.probe().await, Reachability::Reachable);
    }

    #[tokio::test]
    async fn test_probe_unreachable_on_non_200() {
        let url = spawn_server(
            Router::new().route("/", get(|| async { StatusCode::SERVICE_UNAVAILABLE })),
        )
        .await;
        let backend = OllamaBackend::new(&url, "llama3", 0.2);
        match backend.probe().await {
            Reachability::Unreachable { reason, hint, .. } => {
                assert!(reason.contains("503"));
                assert!(hint.contains("ollama serve"));
            }
            other => panic!("expected unreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_probe_unreachable_when_nothing_listens() {
        let backend = OllamaBackend::new(&closed_port_url().await, "llama3", 0.2);
        assert!(matches!(
            backend.probe().await,
            Reachability::Unreachable { .. }
        ));
    }

    #[tokio::test]
    async fn test_generate_sends_model_and_temperature() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                let echoed = format!(
                    "{}|{}|{}|{}",
                    body["model"].as_str().unwrap_or_default(),
                    body["prompt"].as_str().unwrap_or_default(),
                    body["stream"],
                    body["options"]["temperature"]
                );
                Json(serde_json::json!({ "response": echoed, "done": true }))
            }),
        );
        let url = spawn_server(router).await;
        let backend = OllamaBackend::new(&url, "llama3", 0.5);

        let output = backend.generate("hello").await.unwrap();
        assert_eq!(output, "llama3|hello|false|0.5");
    }

    #[tokio::test]
    async fn test_generate_unparseable_body_is_malformed() {
        let router = Router::new().route("/api/generate", post(|| async { "not json at all" }));
        let url = spawn_server(router).await;
        let backend = OllamaBackend::new(&url, "llama3", 0.5);

        let err = backend.generate("hello").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedOutput(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_generate_refused_connection_is_connection_error() {
        let backend = OllamaBackend::new(&closed_port_url().await, "llama3", 0.5);
        let err = backend.generate("hello").await.unwrap_err();
        assert!(matches!(err, AppError::Connection(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_generate_missing_model_hints_pull() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({ "error": "model \"llama3\" not found, try pulling it first" })),
                )
            }),
        );
        let url = spawn_server(router).await;
        let backend = OllamaBackend::new(&url, "llama3", 0.5);

        let err = backend.generate("hello").await.unwrap_err();
        assert!(err.to_string().contains("ollama pull llama3"), "{err}");
    }
}
