//! Hosted backend using the OpenAI chat completions API.

use super::{transport_error, Backend, BackendDescriptor};
use crate::config::Provider;
use crate::error::{AppError, Result};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default timeout and optional API base.
///
/// Retries are disabled: a rate-limited request fails on its first reply.
/// The API key is read from `OPENAI_API_KEY` by `OpenAIConfig`; a missing key
/// surfaces on the first request, not here.
pub fn create_client(api_base: Option<&str>) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::default()
        });

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }

    let no_retry = backoff::ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();

    Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(no_retry)
}

/// OpenAI-based text generation.
pub struct OpenAIBackend {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f64,
    api_base: Option<String>,
}

impl OpenAIBackend {
    pub fn new(model: &str, temperature: f64, api_base: Option<&str>) -> Self {
        Self {
            client: create_client(api_base),
            model: model.to_string(),
            temperature,
            api_base: api_base.map(str::to_string),
        }
    }
}

fn classify_openai_error(err: OpenAIError) -> AppError {
    match err {
        OpenAIError::Reqwest(e) => transport_error(e, "OpenAI"),
        OpenAIError::JSONDeserialize(e) => {
            AppError::MalformedOutput(format!("unexpected OpenAI response: {}", e))
        }
        other => AppError::Backend(format!("OpenAI request failed: {}", other)),
    }
}

#[async_trait]
impl Backend for OpenAIBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            provider: Provider::Hosted,
            model: self.model.clone(),
            temperature: self.temperature,
            endpoint: self.api_base.clone(),
        }
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| AppError::Backend(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message.into()])
            .temperature(self.temperature as f32)
            .build()
            .map_err(|e| AppError::Backend(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_openai_error)?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| AppError::MalformedOutput("empty response from OpenAI".to_string()))?;

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }
}
