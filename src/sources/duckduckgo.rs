//! Web search through the DuckDuckGo HTML endpoint.
//!
//! The result page is scraped into a plain-text blob, one block per hit:
//! `title - url` followed by the snippet. The blob is deliberately left
//! unstructured; normalizing it is the language model's job.

use super::{decode_entities, SearchSource};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!("tubedigest/", env!("CARGO_PKG_VERSION"));
const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Returned when the page holds no organic results.
pub const NO_RESULTS: &str = "No good DuckDuckGo Search Result was found";

/// DuckDuckGo search client.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
    link_regex: Regex,
    snippet_regex: Regex,
    href_regex: Regex,
    tag_regex: Regex,
}

/// One scraped hit.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchHit {
    title: String,
    url: String,
    snippet: Option<String>,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, max_results)
    }

    /// Point the client at a different results page (mirrors, tests).
    pub fn with_endpoint(endpoint: &str, max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            max_results: max_results.max(1),
            link_regex: Regex::new(r#"(?s)<a([^>]*class="result__a"[^>]*)>(.*?)</a>"#)
                .expect("Invalid regex"),
            snippet_regex: Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
                .expect("Invalid regex"),
            href_regex: Regex::new(r#"href="([^"]*)""#).expect("Invalid regex"),
            tag_regex: Regex::new(r"<[^>]*>").expect("Invalid regex"),
        }
    }

    fn clean_text(&self, html: &str) -> String {
        let stripped = self.tag_regex.replace_all(html, "");
        let decoded = decode_entities(&stripped);
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Extract hits from a result page, in page order.
    fn parse_results(&self, html: &str) -> Vec<SearchHit> {
        let links: Vec<_> = self.link_regex.captures_iter(html).collect();
        let snippets: Vec<_> = self.snippet_regex.captures_iter(html).collect();

        let mut hits = Vec::new();
        for (i, link) in links.iter().enumerate() {
            let Some(whole) = link.get(0) else {
                continue;
            };
            let next_start = links
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(html.len());

            let Some(href) = self
                .href_regex
                .captures(&link[1])
                .map(|caps| caps[1].to_string())
            else {
                continue;
            };
            let Some(url) = resolve_redirect(&decode_entities(&href)) else {
                continue;
            };

            let snippet = snippets
                .iter()
                .filter_map(|caps| caps.get(0).map(|m| (m.start(), caps)))
                .find(|(start, _)| *start > whole.end() && *start < next_start)
                .map(|(_, caps)| self.clean_text(&caps[1]))
                .filter(|s| !s.is_empty());

            hits.push(SearchHit {
                title: self.clean_text(&link[2]),
                url,
                snippet,
            });

            if hits.len() >= self.max_results {
                break;
            }
        }
        hits
    }
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect links; drop ad links.
fn resolve_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    let parsed = url::Url::parse(&absolute).ok()?;

    if parsed.path().starts_with("/y.js") {
        return None;
    }
    if parsed.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned());
    }
    Some(absolute)
}

fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| match &hit.snippet {
            Some(snippet) => format!("{} - {}\n{}", hit.title, hit.url, snippet),
            None => format!("{} - {}", hit.title, hit.url),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl SearchSource for DuckDuckGoSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<String> {
        let url = url::Url::parse_with_params(&self.endpoint, &[("q", query)])
            .map_err(|e| AppError::Source(format!("invalid search endpoint: {}", e)))?;

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Source(format!("search request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AppError::Source(format!(
                "search service answered {}",
                status
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::Source(format!("search response unreadable: {}", e)))?;

        let hits = self.parse_results(&html);
        debug!("Search returned {} hits", hits.len());

        if hits.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        Ok(format_hits(&hits))
    }
}
