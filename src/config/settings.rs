//! Configuration settings for tubedigest.
//!
//! Settings are read once from a TOML document and validated eagerly. Every
//! key of the core schema is required; a missing or malformed key fails with
//! the dotted path of the offending field. Only the keys documented as
//! optional (`llm.base_url`, `hosted.api_base`, `[prompts]`) may be omitted.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Conventional configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Default address of a local Ollama server.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub llm: LlmSettings,
    pub hosted: HostedSettings,
    pub video: VideoSettings,
    pub deep_search: DeepSearchSettings,
    #[serde(default, skip_serializing_if = "PromptSettings::is_empty")]
    pub prompts: PromptSettings,
}

/// Which language-model backend generates text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Provider {
    /// Local inference server (Ollama).
    Local,
    /// Hosted API (OpenAI-compatible).
    Hosted,
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "ollama" => Ok(Provider::Local),
            "hosted" | "openai" => Ok(Provider::Hosted),
            _ => Err(format!(
                "unknown provider `{}` (expected local, ollama, hosted or openai)",
                s
            )),
        }
    }
}

impl TryFrom<String> for Provider {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Local => write!(f, "local"),
            Provider::Hosted => write!(f, "hosted"),
        }
    }
}

/// Model selection shared by both providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSettings {
    pub provider: Provider,
    /// Model name used by the local backend.
    pub model: String,
    /// Sampling temperature in [0, 1], used by both backends.
    pub temperature: f64,
    /// Base URL of the local backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Hosted API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostedSettings {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Transcript retrieval options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VideoSettings {
    /// Ask the transcript service for video metadata as well.
    pub add_video_info: bool,
}

/// Deep search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeepSearchSettings {
    /// Default for the deep search toggle in the front ends.
    pub enabled: bool,
    /// Maximum number of raw search results handed to the normalizer.
    pub max_results: u32,
    /// Mark video-platform sources with `highlight = true`.
    pub highlight_video_sources: bool,
}

/// Prompt customization settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_dir: Option<String>,
}

impl PromptSettings {
    fn is_empty(&self) -> bool {
        self.custom_dir.is_none()
    }
}

impl Settings {
    /// Load settings from the conventional location.
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_config_path())
    }

    /// Load and validate settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(
                "<file>",
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings =
            serde_path_to_error::deserialize(toml::Deserializer::new(content))
                .map_err(path_error)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Range and format checks the schema alone cannot express.
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(AppError::config(
                "llm.temperature",
                format!("must be between 0 and 1, got {}", self.llm.temperature),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(AppError::config("llm.model", "must not be empty"));
        }
        if self.hosted.model.trim().is_empty() {
            return Err(AppError::config("hosted.model", "must not be empty"));
        }
        if let Some(base) = &self.llm.base_url {
            validate_http_url(base).map_err(|e| AppError::config("llm.base_url", e))?;
        }
        if let Some(base) = &self.hosted.api_base {
            validate_http_url(base).map_err(|e| AppError::config("hosted.api_base", e))?;
        }
        if self.deep_search.max_results == 0 {
            return Err(AppError::config(
                "deep_search.max_results",
                "must be a positive integer, got 0",
            ));
        }
        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// `./config.toml` wins when present; otherwise the per-user config
    /// directory is consulted.
    pub fn default_config_path() -> PathBuf {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return local;
        }
        match dirs::config_dir() {
            Some(dir) => {
                let user = dir.join("tubedigest").join(DEFAULT_CONFIG_FILE);
                if user.exists() {
                    user
                } else {
                    local
                }
            }
            None => local,
        }
    }

    /// Serialize the settings back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::config("<document>", e.to_string()))
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Base URL of the local backend, falling back to the Ollama default.
    pub fn local_base_url(&self) -> &str {
        self.llm.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    /// Expanded custom prompt directory, if configured.
    pub fn custom_prompt_dir(&self) -> Option<PathBuf> {
        self.prompts.custom_dir.as_deref().map(Self::expand_path)
    }
}

fn validate_http_url(raw: &str) -> std::result::Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL `{}`: {}", raw, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported URL scheme `{}`", other)),
    }
}

/// Turn a deserialization error into a config error naming the field.
///
/// serde reports a missing key against its parent table, so the key name is
/// appended to the path.
fn path_error(err: serde_path_to_error::Error<toml::de::Error>) -> AppError {
    let path = err.path().to_string();
    let parent = if path == "." { String::new() } else { path };
    let message = err.inner().message().to_string();

    let field = match missing_field(&message) {
        Some(key) if parent.is_empty() => key.to_string(),
        Some(key) => format!("{}.{}", parent, key),
        None if parent.is_empty() => "<document>".to_string(),
        None => parent,
    };
    AppError::config(field, message)
}

fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
}
