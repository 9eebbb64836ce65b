//! Defines the `Track` value, the one representation of a playable item that every
//! resolver produces and the playback controller consumes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

/// Captures the 11 character video id out of the common YouTube URL shapes.
static YOUTUBE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|v/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})")
        .expect("static regex")
});

/// Immutable descriptor of a playable audio item.
///
/// `stream_url` is only ever handed to the audio sink; `source_url` is what users see
/// and what the thumbnail is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    title: String,
    stream_url: String,
    source_url: String,
    platform_icon: String,
    /// `0` when the duration is unknown (live streams).
    duration_seconds: u64,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        stream_url: impl Into<String>,
        source_url: impl Into<String>,
        platform_icon: impl Into<String>,
        duration_seconds: u64,
    ) -> Self {
        Self {
            title: title.into(),
            stream_url: stream_url.into(),
            source_url: source_url.into(),
            platform_icon: platform_icon.into(),
            duration_seconds,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn platform_icon(&self) -> &str {
        &self.platform_icon
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// `None` for live streams.
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_seconds > 0).then(|| Duration::from_secs(self.duration_seconds))
    }

    /// Thumbnail derived from the YouTube video id of the source URL, if it has one.
    pub fn thumbnail_url(&self) -> Option<String> {
        YOUTUBE_ID_REGEX
            .captures(&self.source_url)
            .and_then(|cap| cap.get(1))
            .map(|id| format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", id.as_str()))
    }

    /// Builds a `Track` out of a single `yt-dlp --dump-json` document.
    ///
    /// The stream URL and title are mandatory; a missing duration is recorded as unknown.
    pub fn from_ytdlp_json(json: &serde_json::Value, platform_icon: &str) -> MusicResult<Self> {
        let title = json["title"]
            .as_str()
            .filter(|title| !title.is_empty())
            .ok_or_else(|| MusicError::ResolutionFailed("yt-dlp output has no title".to_string()))?;

        let stream_url = json["url"].as_str().ok_or_else(|| {
            MusicError::ResolutionFailed(format!("no playable stream found for '{}'", title))
        })?;

        let source_url = json["webpage_url"]
            .as_str()
            .or_else(|| json["original_url"].as_str())
            .ok_or_else(|| {
                MusicError::ResolutionFailed(format!("no source URL reported for '{}'", title))
            })?;

        // yt-dlp reports floats for most extractors and integers for some
        let duration_seconds = json["duration"]
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| secs.round() as u64)
            .unwrap_or(0);

        Ok(Self::new(
            title,
            stream_url,
            source_url,
            platform_icon,
            duration_seconds,
        ))
    }
}
