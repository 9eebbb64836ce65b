//! Implements the `AudioApi` trait for YouTube, the direct backend.
//! Recognized links are extracted as-is, anything else is treated as a search term.

use serenity::async_trait;
use tracing::info;
use url::Url;

use super::{AudioApi, Track, ytdlp::YtDlp};
use crate::commands::music::utils::music_manager::MusicResult;

pub const YOUTUBE_ICON: &str = "https://cdn4.iconfinder.com/data/icons/social-messaging-ui-color-shapes-2-free/128/social-youtube-circle-512.png";

/// The main struct implementing YouTube API logic (via `yt-dlp`).
#[derive(Debug, Clone, Default)]
pub struct YoutubeApi {
    ytdlp: YtDlp,
}

impl YoutubeApi {
    pub fn new(ytdlp: YtDlp) -> Self {
        Self { ytdlp }
    }

    /// Checks if the input string is a YouTube video link (watch page, shorts or youtu.be).
    pub fn is_youtube_url(query: &str) -> bool {
        let Ok(url) = Url::parse(query) else {
            return false;
        };

        match url.host_str() {
            Some("youtu.be") => url.path().len() > 1,
            Some("www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com") => {
                (url.path() == "/watch" && url.query_pairs().any(|(key, _)| key == "v"))
                    || url.path().starts_with("/shorts/")
                    || url.path().starts_with("/embed/")
            }
            _ => false,
        }
    }
}

#[async_trait]
impl AudioApi for YoutubeApi {
    fn is_valid_url(&self, url: &str) -> bool {
        Self::is_youtube_url(url)
    }

    async fn resolve(&self, query: &str) -> MusicResult<Track> {
        if Self::is_youtube_url(query) {
            info!("Resolving YouTube link: {}", query);
            self.ytdlp.extract(query, YOUTUBE_ICON).await
        } else {
            info!("Resolving YouTube search: {}", query);
            self.ytdlp.search(query, YOUTUBE_ICON).await
        }
    }
}
