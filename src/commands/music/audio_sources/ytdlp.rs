//! Thin async wrapper around the `yt-dlp` command-line tool.
//!
//! Both resolver backends end up here: the catalog backend searches by title and
//! artists, the direct backend extracts a link or searches the raw query.

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::track_metadata::Track;
use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

/// Prefer m4a so the driver can decode it with the aac/isomp4 codecs.
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio/best";

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Extracts a single video from a link.
    pub async fn extract(&self, url: &str, platform_icon: &str) -> MusicResult<Track> {
        info!("Extracting stream with yt-dlp for URL: {}", url);
        self.run(url, platform_icon).await
    }

    /// Resolves the first search result for a term.
    pub async fn search(&self, term: &str, platform_icon: &str) -> MusicResult<Track> {
        info!("Searching yt-dlp for: {}", term);
        self.run(&format!("ytsearch1:{}", term), platform_icon).await
    }

    async fn run(&self, target: &str, platform_icon: &str) -> MusicResult<Track> {
        let output = Command::new(&self.binary)
            .args([
                "-j",            // Output as JSON
                "--no-playlist", // Don't process playlists
                "--no-warnings",
                "-f",
                AUDIO_FORMAT,
                target,
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MusicError::ResolutionFailed(format!("Failed to run yt-dlp: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp exited with {} for {}: {}", output.status, target, stderr.trim());
            return Err(classify_failure(target, &stderr));
        }

        // A search without hits exits cleanly with nothing on stdout
        let Some(line) = stdout.lines().find(|line| !line.trim().is_empty()) else {
            debug!("yt-dlp returned no results for {}", target);
            return Err(MusicError::TrackNotFound(target.to_string()));
        };

        let json: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            MusicError::ResolutionFailed(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        Track::from_ytdlp_json(&json, platform_icon)
    }
}

/// Distinguishes "this video does not exist" from transient extractor failures.
fn classify_failure(target: &str, stderr: &str) -> MusicError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("video unavailable")
        || lowered.contains("not available")
        || lowered.contains("does not exist")
        || lowered.contains("private video")
    {
        MusicError::TrackNotFound(target.to_string())
    } else {
        MusicError::ResolutionFailed(stderr.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn unavailable_videos_are_not_found() {
        assert_matches!(
            classify_failure("x", "ERROR: [youtube] abc: Video unavailable"),
            MusicError::TrackNotFound(_)
        );
    }

    #[test]
    fn network_failures_are_transient() {
        assert_matches!(
            classify_failure("x", "ERROR: Unable to download webpage: timed out"),
            MusicError::ResolutionFailed(_)
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_resolution_failure() {
        let ytdlp = YtDlp::new("/nonexistent/yt-dlp-binary");
        assert_matches!(
            ytdlp.search("anything", "icon").await,
            Err(MusicError::ResolutionFailed(_))
        );
    }
}
