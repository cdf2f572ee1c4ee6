//! Prompt templates for tubedigest.
//!
//! Templates use `{{name}}` placeholders. Rendering is strict: every
//! placeholder in a template must be supplied, a missing key is an error
//! rather than an empty substitution.
//!
//! Templates can be customized by placing TOML files (`summary.toml`,
//! `topic.toml`, `normalize.toml`, each with a `template` key) in the custom
//! prompts directory.

use crate::error::{AppError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

/// Placeholder keys each named template may use.
const SUMMARY_KEYS: &[&str] = &["transcript"];
const TOPIC_KEYS: &[&str] = &["summary"];
const NORMALIZE_KEYS: &[&str] = &["raw", "highlight_rule"];

const SUMMARY_TEMPLATE: &str = r#"Summarize the following YouTube transcript in a clear, structured way.
Highlight key ideas, arguments, and actionable insights.

Transcript:
{{transcript}}
"#;

const TOPIC_TEMPLATE: &str = r#"Extract the main subject of the following summary.
Return only a short phrase.

Summary:
{{summary}}
"#;

const NORMALIZE_TEMPLATE: &str = r#"You are a Deep Search Agent.

Normalize the following raw search results into a JSON array.
For each item, extract:

- "title"
- "url"
- "author" (if available)
- "publishedAt": timestamp or publication date (if available)
- "type": one of article, blog, repo, video, book, course, other
- "highlight": {{highlight_rule}}

Raw results:
{{raw}}

Return JSON only.
"#;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Named text values fed into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateInput(BTreeMap<String, String>);

impl TemplateInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, returning the input for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A named prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    text: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder keys referenced by the template.
    pub fn placeholders(&self) -> BTreeSet<String> {
        placeholder_regex()
            .captures_iter(&self.text)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Render the template, failing on the first placeholder the input lacks.
    pub fn render(&self, input: &TemplateInput) -> Result<String> {
        let mut missing = None;
        let rendered = placeholder_regex().replace_all(&self.text, |caps: &regex::Captures| {
            match input.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => {
                    missing.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(key) => Err(AppError::Template {
                template: self.name.clone(),
                key,
            }),
            None => Ok(rendered.into_owned()),
        }
    }

    /// Check that the template only uses the given keys and uses all of them.
    fn check_keys(&self, allowed: &[&str]) -> std::result::Result<(), String> {
        let used = self.placeholders();
        if let Some(unknown) = used.iter().find(|k| !allowed.contains(&k.as_str())) {
            return Err(format!(
                "template `{}` uses unknown placeholder `{}` (allowed: {})",
                self.name,
                unknown,
                allowed.join(", ")
            ));
        }
        if let Some(absent) = allowed.iter().find(|k| !used.contains(**k)) {
            return Err(format!(
                "template `{}` never references `{{{{{}}}}}`",
                self.name, absent
            ));
        }
        Ok(())
    }
}

/// Collection of all prompt templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub summary: PromptTemplate,
    pub topic: PromptTemplate,
    pub normalize: PromptTemplate,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            summary: PromptTemplate::new("summary", SUMMARY_TEMPLATE),
            topic: PromptTemplate::new("topic", TOPIC_TEMPLATE),
            normalize: PromptTemplate::new("normalize", NORMALIZE_TEMPLATE),
        }
    }
}

/// On-disk shape of a custom prompt file.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    template: String,
}

impl Prompts {
    /// Load prompts, overriding defaults with files from `custom_dir`.
    pub fn load(custom_dir: Option<&Path>) -> Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            for (slot, allowed) in [
                (&mut prompts.summary, SUMMARY_KEYS),
                (&mut prompts.topic, TOPIC_KEYS),
                (&mut prompts.normalize, NORMALIZE_KEYS),
            ] {
                let path = dir.join(format!("{}.toml", slot.name()));
                if !path.exists() {
                    continue;
                }
                let content = std::fs::read_to_string(&path)?;
                let file: TemplateFile = toml::from_str(&content)?;
                let custom = PromptTemplate::new(slot.name(), file.template);
                custom
                    .check_keys(allowed)
                    .map_err(|e| AppError::config(format!("prompts.{}", slot.name()), e))?;
                *slot = custom;
            }
        }

        Ok(prompts)
    }
}
