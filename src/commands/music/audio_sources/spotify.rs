//! Implements the `AudioApi` trait for Spotify, the catalog backend.
//! Handles authentication (client credentials flow), URL parsing, and catalog lookups;
//! the playable stream itself is then located on YouTube by title and artists.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use regex::Regex;
use reqwest::{StatusCode, header};
use serde::Deserialize;
use serenity::async_trait;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{AudioApi, Track, ytdlp::YtDlp};
use crate::HTTP_CLIENT;
use crate::commands::music::utils::music_manager::{MusicError, MusicResult};
use crate::config::SpotifyCredentials;

pub const SPOTIFY_ICON: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/1/19/Spotify_logo_without_text.svg/480px-Spotify_logo_without_text.svg.png";

const API_BASE: &str = "https://api.spotify.com";
const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

/// Regex to match and capture Spotify track links and URIs.
static SPOTIFY_TRACK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:https?://)?open\.spotify\.com/(?:intl-[a-z]+/)?track/|spotify:track:)([a-zA-Z0-9]+)(?:\?.*)?$")
        .expect("static regex")
});

/// Basic track information retrieved from the Spotify catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpotifyTrack {
    pub name: String,
    pub artists: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyToken {
    access_token: String,
    expires_in: u64,
    #[serde(skip, default = "Instant::now")]
    created_at: Instant,
}

impl SpotifyToken {
    /// Considers the token expired 30 seconds before its actual expiry time.
    fn is_expired(&self) -> bool {
        let expiry = Duration::from_secs(self.expires_in);
        self.created_at.elapsed() > expiry.saturating_sub(Duration::from_secs(30))
    }
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Paging,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    items: Vec<TrackObject>,
}

impl From<TrackObject> for SpotifyTrack {
    fn from(value: TrackObject) -> Self {
        Self {
            name: value.name,
            artists: value.artists.into_iter().map(|a| a.name).collect(),
        }
    }
}

/// The main struct implementing Spotify API logic.
pub struct SpotifyApi {
    http: reqwest::Client,
    credentials: Option<SpotifyCredentials>,
    api_base: String,
    accounts_base: String,
    token: Mutex<Option<SpotifyToken>>,
    ytdlp: YtDlp,
}

impl SpotifyApi {
    pub fn new(credentials: Option<SpotifyCredentials>, ytdlp: YtDlp) -> Self {
        Self::with_endpoints(
            HTTP_CLIENT.clone(),
            credentials,
            API_BASE,
            ACCOUNTS_BASE,
            ytdlp,
        )
    }

    /// Same as [`SpotifyApi::new`] against custom endpoints.
    pub fn with_endpoints(
        http: reqwest::Client,
        credentials: Option<SpotifyCredentials>,
        api_base: impl Into<String>,
        accounts_base: impl Into<String>,
        ytdlp: YtDlp,
    ) -> Self {
        Self {
            http,
            credentials,
            api_base: api_base.into(),
            accounts_base: accounts_base.into(),
            token: Mutex::new(None),
            ytdlp,
        }
    }

    pub fn is_spotify_url(url: &str) -> bool {
        SPOTIFY_TRACK_REGEX.is_match(url)
    }

    pub fn extract_track_id(url: &str) -> Option<String> {
        SPOTIFY_TRACK_REGEX
            .captures(url)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Search query used to find the playable counterpart of a catalog track.
    pub fn youtube_search_query(track: &SpotifyTrack) -> String {
        if track.artists.is_empty() {
            track.name.clone()
        } else {
            format!("{} {}", track.name, track.artists.join(" "))
        }
    }

    /// Looks a query up in the catalog: track links by id, everything else by search.
    pub async fn lookup(&self, query: &str) -> MusicResult<SpotifyTrack> {
        match Self::extract_track_id(query) {
            Some(track_id) => self.get_track(&track_id).await,
            None => self.search_track(query).await,
        }
    }

    /// Retrieves a valid access token, reusing the cached one until it expires.
    async fn get_access_token(&self) -> MusicResult<String> {
        let mut token_lock = self.token.lock().await;

        if let Some(token) = &*token_lock {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let credentials = self.credentials.as_ref().ok_or_else(|| {
            MusicError::ConfigError(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set".to_string(),
            )
        })?;

        let auth = BASE64_STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));

        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .header(header::AUTHORIZATION, format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to request Spotify token: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let token = response.json::<SpotifyToken>().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify token: {}", e))
        })?;

        debug!("Obtained Spotify token valid for {}s", token.expires_in);
        let access_token = token.access_token.clone();
        *token_lock = Some(token);

        Ok(access_token)
    }

    /// Fetches a single catalog track by its id.
    pub async fn get_track(&self, track_id: &str) -> MusicResult<SpotifyTrack> {
        let token = self.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/v1/tracks/{}", self.api_base, track_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to request Spotify track: {}", e))
            })?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                return Err(MusicError::TrackNotFound(track_id.to_string()));
            }
            status if !status.is_success() => return Err(api_error(response).await),
            _ => {}
        }

        let track = response.json::<TrackObject>().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify track data: {}", e))
        })?;

        Ok(track.into())
    }

    /// Returns the best catalog match for a free-text query.
    pub async fn search_track(&self, query: &str) -> MusicResult<SpotifyTrack> {
        let token = self.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/v1/search", self.api_base))
            .bearer_auth(token)
            .query(&[("q", query), ("type", "track"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to search Spotify: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let results = response.json::<SearchResponse>().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify search: {}", e))
        })?;

        results
            .tracks
            .items
            .into_iter()
            .next()
            .map(SpotifyTrack::from)
            .ok_or_else(|| MusicError::TrackNotFound(query.to_string()))
    }
}

async fn api_error(response: reqwest::Response) -> MusicError {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Cannot read response".to_string());
    MusicError::ExternalApiError(format!("Spotify API error: {} - {}", status, text))
}

#[async_trait]
impl AudioApi for SpotifyApi {
    fn is_valid_url(&self, url: &str) -> bool {
        Self::is_spotify_url(url)
    }

    async fn resolve(&self, query: &str) -> MusicResult<Track> {
        let catalog_track = self.lookup(query).await?;
        let search = Self::youtube_search_query(&catalog_track);
        info!("Spotify match for '{}', searching stream for: {}", query, search);
        self.ytdlp.search(&search, SPOTIFY_ICON).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC", Some("4uLU6hMCjMI75M1A2tKUQC") ; "track link")]
    #[test_case("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc", Some("4uLU6hMCjMI75M1A2tKUQC") ; "with share param")]
    #[test_case("https://open.spotify.com/intl-de/track/4uLU6hMCjMI75M1A2tKUQC", Some("4uLU6hMCjMI75M1A2tKUQC") ; "localized link")]
    #[test_case("spotify:track:4uLU6hMCjMI75M1A2tKUQC", Some("4uLU6hMCjMI75M1A2tKUQC") ; "uri")]
    #[test_case("https://open.spotify.com/album/1ATL5GLyefJaxhQzSPVrLX", None ; "album")]
    #[test_case("daft punk one more time", None ; "search term")]
    fn extracts_track_ids(input: &str, expected: Option<&str>) {
        assert_eq!(SpotifyApi::extract_track_id(input).as_deref(), expected);
    }

    #[test]
    fn search_query_joins_artists() {
        let track = SpotifyTrack {
            name: "Get Lucky".to_string(),
            artists: vec!["Daft Punk".to_string(), "Pharrell Williams".to_string()],
        };
        assert_eq!(
            SpotifyApi::youtube_search_query(&track),
            "Get Lucky Daft Punk Pharrell Williams"
        );
    }
}
