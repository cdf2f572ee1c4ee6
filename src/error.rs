//! Error types for tubedigest.

use thiserror::Error;

/// Library-level error type for tubedigest operations.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error at `{field}`: {message}")]
    Config { field: String, message: String },

    #[error("Template `{template}` is missing required key `{key}`")]
    Template { template: String, key: String },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Malformed backend output: {0}")]
    MalformedOutput(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AppError {
    /// Shorthand for a configuration error at a dotted field path.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for tubedigest operations.
pub type Result<T> = std::result::Result<T, AppError>;
