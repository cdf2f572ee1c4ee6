//! Normalized deep-search records.
//!
//! The deep-search pipeline returns whatever the model produced. Callers that
//! want structure can run [`parse_records`], which tolerates the usual
//! model habits (code fences, prose around the array).

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Kind of source a record points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Article,
    Blog,
    Repo,
    Video,
    Book,
    Course,
    #[serde(other)]
    Other,
}

/// One normalized search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        rename = "publishedAt",
        alias = "published_at",
        alias = "timestamp",
        alias = "date",
        skip_serializing_if = "Option::is_none"
    )]
    pub published_at: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub kind: SourceType,
    #[serde(default)]
    pub highlight: bool,
}

fn default_type() -> SourceType {
    SourceType::Other
}

/// Extract the JSON array of records from model output.
pub fn parse_records(raw: &str) -> Result<Vec<SourceRecord>> {
    let start = raw.find('[');
    let end = raw.rfind(']');

    let json = match (start, end) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => {
            return Err(AppError::MalformedOutput(
                "no JSON array found in search results".to_string(),
            ))
        }
    };

    serde_json::from_str(json)
        .map_err(|e| AppError::MalformedOutput(format!("search results are not valid records: {}", e)))
}
