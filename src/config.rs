//! Environment driven configuration.
//!
//! Everything is read once at startup. `.env` files are honoured through `dotenv`.

use std::env;
use std::time::Duration;

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

/// Credentials for the Spotify client credentials flow.
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Knobs of the playback controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Maximum number of pending tracks per guild.
    pub queue_capacity: usize,
    /// Deadline for a single track resolution.
    pub resolve_timeout: Duration,
    /// Delay before a finished "now playing" message is deleted.
    pub status_retract_delay: Duration,
    /// Delay before short command replies are deleted.
    pub reply_retract_delay: Duration,
    /// Extra time granted past a track's duration before the watchdog ends the episode.
    pub watchdog_grace: Duration,
    /// Watchdog ceiling for tracks with an unknown duration (live streams).
    pub watchdog_unknown_duration: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 150,
            resolve_timeout: Duration::from_secs(30),
            status_retract_delay: Duration::from_secs(1),
            reply_retract_delay: Duration::from_secs(3),
            watchdog_grace: Duration::from_secs(30),
            watchdog_unknown_duration: Duration::from_secs(3 * 60 * 60),
        }
    }
}

impl PlayerConfig {
    /// How long an episode may last before it is forcibly ended.
    pub fn watchdog_for(&self, duration_seconds: u64) -> Duration {
        if duration_seconds == 0 {
            self.watchdog_unknown_duration
        } else {
            Duration::from_secs(duration_seconds).saturating_add(self.watchdog_grace)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub spotify: Option<SpotifyCredentials>,
    pub ytdlp_path: String,
    pub player: PlayerConfig,
}

impl Config {
    /// Load the configuration from the process environment (after reading `.env`).
    pub fn from_env() -> MusicResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> MusicResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| MusicError::ConfigError("DISCORD_TOKEN not set".to_string()))?;

        let spotify = match (lookup("SPOTIFY_CLIENT_ID"), lookup("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let defaults = PlayerConfig::default();
        let player = PlayerConfig {
            queue_capacity: parse_or(&lookup, "QUEUE_CAPACITY", defaults.queue_capacity)?,
            resolve_timeout: seconds_or(&lookup, "RESOLVE_TIMEOUT_SECS", defaults.resolve_timeout)?,
            status_retract_delay: seconds_or(
                &lookup,
                "STATUS_RETRACT_DELAY_SECS",
                defaults.status_retract_delay,
            )?,
            reply_retract_delay: seconds_or(
                &lookup,
                "REPLY_RETRACT_DELAY_SECS",
                defaults.reply_retract_delay,
            )?,
            watchdog_grace: seconds_or(&lookup, "WATCHDOG_GRACE_SECS", defaults.watchdog_grace)?,
            watchdog_unknown_duration: seconds_or(
                &lookup,
                "WATCHDOG_UNKNOWN_DURATION_SECS",
                defaults.watchdog_unknown_duration,
            )?,
        };

        let config = Self {
            discord_token,
            spotify,
            ytdlp_path: lookup("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            player,
        };

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks that would otherwise surface as a stuck player.
    pub fn validate(&self) -> MusicResult<()> {
        if self.player.queue_capacity == 0 {
            return Err(MusicError::ConfigError(
                "QUEUE_CAPACITY must be greater than 0".to_string(),
            ));
        }
        if self.player.resolve_timeout.is_zero() {
            return Err(MusicError::ConfigError(
                "RESOLVE_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.player.watchdog_unknown_duration.is_zero() {
            return Err(MusicError::ConfigError(
                "WATCHDOG_UNKNOWN_DURATION_SECS must be greater than 0".to_string(),
            ));
        }
        if self.ytdlp_path.trim().is_empty() {
            return Err(MusicError::ConfigError("YTDLP_PATH is empty".to_string()));
        }
        Ok(())
    }

    /// One line summary without secrets, for the startup log.
    pub fn summary(&self) -> String {
        format!(
            "queue capacity {}, resolve timeout {}s, spotify {}, yt-dlp at `{}`",
            self.player.queue_capacity,
            self.player.resolve_timeout.as_secs(),
            if self.spotify.is_some() { "enabled" } else { "disabled" },
            self.ytdlp_path
        )
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> MusicResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| MusicError::ConfigError(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}

fn seconds_or<F>(lookup: &F, key: &str, default: Duration) -> MusicResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_token_is_set() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();

        assert_eq!(config.player, PlayerConfig::default());
        assert_eq!(config.player.queue_capacity, 150);
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert!(config.spotify.is_none());
    }

    #[test]
    fn missing_token_is_rejected() {
        assert_matches!(
            Config::from_lookup(lookup(&[])),
            Err(MusicError::ConfigError(_))
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("QUEUE_CAPACITY", "10"),
            ("RESOLVE_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.player.queue_capacity, 10);
        assert_eq!(config.player.resolve_timeout, Duration::from_secs(5));
        assert_eq!(config.spotify.unwrap().client_id, "id");
    }

    #[test]
    fn zero_capacity_fails_validation() {
        assert_matches!(
            Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc"), ("QUEUE_CAPACITY", "0")])),
            Err(MusicError::ConfigError(_))
        );
    }

    #[test]
    fn garbage_numbers_are_reported() {
        assert_matches!(
            Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc"), ("QUEUE_CAPACITY", "lots")])),
            Err(MusicError::ConfigError(msg)) if msg.contains("QUEUE_CAPACITY")
        );
    }

    #[test]
    fn watchdog_covers_unknown_durations() {
        let player = PlayerConfig::default();
        assert_eq!(player.watchdog_for(0), player.watchdog_unknown_duration);
        assert_eq!(player.watchdog_for(60), Duration::from_secs(90));
    }

    #[test]
    fn watchdog_saturates_on_huge_values() {
        let player = PlayerConfig {
            watchdog_grace: Duration::MAX,
            ..PlayerConfig::default()
        };
        assert_eq!(player.watchdog_for(u64::MAX), Duration::MAX);
        assert_eq!(player.watchdog_for(60), Duration::MAX);
    }
}
