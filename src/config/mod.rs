//! Configuration module for tubedigest.
//!
//! Handles loading and validating application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{PromptTemplate, Prompts, TemplateInput};
pub use settings::{
    DeepSearchSettings, HostedSettings, LlmSettings, PromptSettings, Provider, Settings,
    VideoSettings, DEFAULT_CONFIG_FILE, DEFAULT_OLLAMA_URL,
};
