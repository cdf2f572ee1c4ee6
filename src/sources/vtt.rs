//! WebVTT subtitle parsing.
//!
//! Auto-generated YouTube captions repeat each line across consecutive cues
//! and carry inline word timings (`<00:00:01.250><c> word</c>`); both are
//! stripped so the result reads as plain prose.

use super::decode_entities;
use regex::Regex;
use std::sync::OnceLock;

fn inline_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"))
}

/// Convert a WebVTT document into plain transcript text.
///
/// Only lines following a timing line in the same block are caption text.
/// Everything else (the header, cue identifiers, NOTE/STYLE/REGION blocks)
/// is dropped.
pub fn vtt_to_text(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_cue = false;

    for raw in vtt.lines() {
        let line = raw.trim();

        if line.is_empty() {
            in_cue = false;
            continue;
        }
        if line.contains("-->") {
            in_cue = true;
            continue;
        }
        if !in_cue {
            continue;
        }

        let text = decode_entities(inline_tag_regex().replace_all(line, "").trim());
        if text.is_empty() {
            continue;
        }
        if lines.last().is_some_and(|last| *last == text) {
            continue;
        }
        lines.push(text);
    }

    lines.join(" ")
}
