//! External text sources: video transcripts and web search.
//!
//! Both are consumed through traits so the pipelines can be wired to the real
//! services or to stand-ins.

mod duckduckgo;
mod vtt;
mod youtube;

pub use duckduckgo::DuckDuckGoSearch;
pub use vtt::vtt_to_text;
pub use youtube::YoutubeTranscripts;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about a video, when the transcript service was asked for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    /// Channel or author name (if available).
    pub channel: Option<String>,
    /// Duration in seconds (if known).
    pub duration_seconds: Option<u32>,
    /// Publication date (if available).
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
}

/// One document returned by a transcript service.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptDocument {
    /// Plain transcript text.
    pub text: String,
    pub metadata: Option<VideoMetadata>,
}

/// Retrieves transcripts for a video URL.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch transcript documents; `include_metadata` asks for video details too.
    async fn fetch(&self, url: &str, include_metadata: bool) -> Result<Vec<TranscriptDocument>>;
}

/// Free-text web search returning an unstructured blob of results.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

/// Decode the HTML entities found in captions and search result markup.
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
