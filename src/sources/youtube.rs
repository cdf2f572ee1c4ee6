//! YouTube transcript retrieval via `yt-dlp`.

use super::{vtt_to_text, TranscriptDocument, TranscriptSource, VideoMetadata};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Transcript source backed by YouTube subtitles.
pub struct YoutubeTranscripts {
    video_id_regex: Regex,
    /// Subtitle language selector passed to `--sub-langs`.
    languages: String,
}

impl YoutubeTranscripts {
    pub fn new() -> Self {
        // Matches various YouTube URL formats and bare video IDs
        let video_id_regex = Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.|m\.)?
                (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/|youtube\.com/v/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex");

        Self {
            video_id_regex,
            languages: "en.*,en".to_string(),
        }
    }

    /// Extract video ID from a YouTube URL or bare ID.
    pub fn extract_video_id(&self, input: &str) -> Option<String> {
        let caps = self.video_id_regex.captures(input.trim())?;

        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }

    fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }

    /// Download subtitles into `dir` and return the subtitle file.
    async fn download_subtitles(&self, video_id: &str, dir: &Path) -> Result<PathBuf> {
        let template = dir.join("%(id)s.%(ext)s");

        let output = Command::new("yt-dlp")
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--sub-langs").arg(&self.languages)
            .arg("--sub-format").arg("vtt")
            .arg("--output").arg(&template)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(Self::watch_url(video_id))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(run_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Source(format!(
                "yt-dlp could not fetch subtitles for {}: {}",
                video_id,
                stderr.trim()
            )));
        }

        find_subtitle_file(dir, video_id)
    }

    /// Fetch metadata using yt-dlp.
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        let url = Self::watch_url(video_id);

        let output = Command::new("yt-dlp")
            .args(["--dump-json", "--no-download", "--no-warnings", &url])
            .output()
            .await
            .map_err(run_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Source(format!(
                "Video {} not found or unavailable: {}",
                video_id,
                stderr.trim()
            )));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            AppError::Source(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        Ok(parse_metadata(video_id, &url, &json))
    }
}

impl Default for YoutubeTranscripts {
    fn default() -> Self {
        Self::new()
    }
}

fn run_error(e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AppError::ToolNotFound("yt-dlp".to_string())
    } else {
        AppError::Source(format!("Failed to run yt-dlp: {}", e))
    }
}

/// Locate the downloaded subtitle file; yt-dlp names it `<id>.<lang>.vtt`.
fn find_subtitle_file(dir: &Path, video_id: &str) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            name.starts_with(video_id) && name.ends_with(".vtt")
        })
        .collect();

    // Prefer manual subtitles (`en.vtt`) over translated/auto variants.
    candidates.sort_by_key(|path| path.as_os_str().len());
    candidates.into_iter().next().ok_or_else(|| {
        AppError::Source(format!("No transcript is available for video {}", video_id))
    })
}

fn parse_metadata(video_id: &str, url: &str, json: &serde_json::Value) -> VideoMetadata {
    let published_at = json["upload_date"].as_str().and_then(|date_str| {
        // yt-dlp returns date as YYYYMMDD
        chrono::NaiveDate::parse_from_str(date_str, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    });

    VideoMetadata {
        id: video_id.to_string(),
        title: json["title"].as_str().unwrap_or("Unknown Title").to_string(),
        channel: json["channel"]
            .as_str()
            .or_else(|| json["uploader"].as_str())
            .map(|s| s.to_string()),
        duration_seconds: json["duration"].as_f64().map(|d| d as u32),
        published_at,
        url: url.to_string(),
    }
}

#[async_trait]
impl TranscriptSource for YoutubeTranscripts {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str, include_metadata: bool) -> Result<Vec<TranscriptDocument>> {
        let video_id = self.extract_video_id(url).ok_or_else(|| {
            AppError::InvalidInput(format!("Invalid YouTube video ID or URL: {}", url))
        })?;

        info!("Fetching transcript for {}", video_id);
        let workdir = tempfile::tempdir()?;
        let subtitle_path = self.download_subtitles(&video_id, workdir.path()).await?;
        let vtt = tokio::fs::read_to_string(&subtitle_path).await?;
        let text = vtt_to_text(&vtt);
        debug!("Transcript has {} characters", text.len());

        if text.is_empty() {
            return Err(AppError::Source(format!(
                "Transcript for video {} is empty",
                video_id
            )));
        }

        let metadata = if include_metadata {
            Some(self.fetch_metadata(&video_id).await?)
        } else {
            None
        };

        Ok(vec![TranscriptDocument { text, metadata }])
    }
}
