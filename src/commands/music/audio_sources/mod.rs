//! This module defines the structure and traits for resolving user queries into
//! playable tracks. Two backends exist: Spotify (catalog lookup, then stream search)
//! and YouTube (direct links or search), both reached through [`TrackResolver`].

/// Submodule implementing the `AudioApi` trait for Spotify.
pub mod spotify;
/// Submodule defining the `Track` descriptor used across audio sources.
pub mod track_metadata;
/// Submodule implementing the `AudioApi` trait for YouTube.
pub mod youtube;
/// Async wrapper around the `yt-dlp` binary.
pub mod ytdlp;

use serenity::async_trait;
use url::Url;

use crate::commands::music::utils::music_manager::MusicResult;
use crate::config::Config;
use spotify::SpotifyApi;
pub use track_metadata::Track;
use youtube::YoutubeApi;
use ytdlp::YtDlp;

/// Which backend a query should be resolved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, poise::ChoiceParameter)]
pub enum SourceHint {
    #[name = "Spotify"]
    Spotify,
    #[name = "Youtube"]
    Youtube,
}

/// Contract of the external track resolution providers.
///
/// Implementations perform network I/O and may take seconds; callers are expected to
/// apply their own deadline.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolve a link or search term into a fully populated `Track`.
    ///
    /// Fails with `TrackNotFound` when nothing matches and with a resolution error
    /// on transient provider failures.
    async fn resolve(&self, query: &str, hint: SourceHint) -> MusicResult<Track>;
}

/// Common interface of a single resolver backend.
#[async_trait]
pub trait AudioApi: Send + Sync {
    /// Checks if the given URL is recognized by this backend.
    fn is_valid_url(&self, url: &str) -> bool;

    /// Resolves a link or search term handled by this backend.
    async fn resolve(&self, query: &str) -> MusicResult<Track>;
}

/// Routes queries to the backend selected by the user's `SourceHint`.
pub struct AudioSources {
    spotify: Box<dyn AudioApi>,
    youtube: Box<dyn AudioApi>,
}

impl AudioSources {
    pub fn new(spotify: Box<dyn AudioApi>, youtube: Box<dyn AudioApi>) -> Self {
        Self { spotify, youtube }
    }

    pub fn from_config(config: &Config) -> Self {
        let ytdlp = YtDlp::new(config.ytdlp_path.clone());
        Self::new(
            Box::new(SpotifyApi::new(config.spotify.clone(), ytdlp.clone())),
            Box::new(YoutubeApi::new(ytdlp)),
        )
    }

    fn backend(&self, hint: SourceHint) -> &dyn AudioApi {
        match hint {
            SourceHint::Spotify => self.spotify.as_ref(),
            SourceHint::Youtube => self.youtube.as_ref(),
        }
    }

    /// Performs a basic check if the input string can be parsed as a URL.
    pub fn is_url(input: &str) -> bool {
        Url::parse(input).is_ok()
    }
}

#[async_trait]
impl TrackResolver for AudioSources {
    async fn resolve(&self, query: &str, hint: SourceHint) -> MusicResult<Track> {
        // A link always wins over the hint when another backend owns it
        let backend = if Self::is_url(query) && !self.backend(hint).is_valid_url(query) {
            [self.youtube.as_ref(), self.spotify.as_ref()]
                .into_iter()
                .find(|api| api.is_valid_url(query))
                .unwrap_or_else(|| self.backend(hint))
        } else {
            self.backend(hint)
        };

        backend.resolve(query.trim()).await
    }
}
