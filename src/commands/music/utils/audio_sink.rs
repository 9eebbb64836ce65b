//! The audio sink contract and its songbird implementation.
//!
//! A sink accepts one stream at a time and reports, exactly once per stream, how that
//! stream ended through a single-shot completion channel.

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use songbird::input::{HttpRequest, Input};
use songbird::tracks::TrackHandle;
use songbird::{Call, Event, TrackEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use super::event_handlers::TrackEndNotifier;
use super::music_manager::{MusicError, MusicResult};
use crate::commands::music::audio_sources::Track;

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The source played to its end, or was stopped on request.
    Finished,
    /// The stream broke (unreachable, network drop, decode failure).
    Failed(String),
}

/// Resolves once with the outcome of the stream it was returned for.
pub type Completion = oneshot::Receiver<PlaybackOutcome>;

/// Reconnect behaviour requested for network streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub reconnect: bool,
    pub reconnect_streamed: bool,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub const DEFAULT: Self = Self {
        reconnect: true,
        reconnect_streamed: true,
        max_delay: Duration::from_secs(5),
    };

    /// Backoff before the given retry attempt (1-based), doubling up to `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        Duration::from_millis(250u64 << exp).min(self.max_delay)
    }

    /// Number of extra attempts allowed before giving up on a stream.
    pub fn retries(&self) -> u32 {
        if !self.reconnect {
            return 0;
        }
        let mut attempts = 0;
        let mut waited = Duration::ZERO;
        while waited < self.max_delay {
            attempts += 1;
            waited += self.backoff(attempts);
        }
        attempts
    }
}

/// Fixed single-band equalizer applied to every stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equalizer {
    pub frequency_hz: f32,
    pub width_hz: f32,
    pub gain_db: f32,
}

impl Equalizer {
    pub const BASS_LIFT: Self = Self {
        frequency_hz: 60.0,
        width_hz: 100.0,
        gain_db: 3.0,
    };
}

/// Everything a sink needs to start streaming a track.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub url: String,
    pub reconnect: ReconnectPolicy,
    pub equalizer: Equalizer,
}

impl StreamRequest {
    pub fn for_track(track: &Track) -> Self {
        Self {
            url: track.stream_url().to_string(),
            reconnect: ReconnectPolicy::DEFAULT,
            equalizer: Equalizer::BASS_LIFT,
        }
    }
}

/// Opaque streaming audio output bound to one voice connection.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Starts streaming; the returned completion fires exactly once when the stream ends.
    async fn play(&self, request: StreamRequest) -> MusicResult<Completion>;

    /// Stops whatever is currently streaming. Stopping an idle sink is a no-op.
    async fn stop(&self) -> MusicResult<()>;
}

/// Sink writing into a songbird call.
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(call: Arc<Mutex<Call>>, http: reqwest::Client) -> Self {
        Self {
            call,
            http,
            current: Mutex::new(None),
        }
    }

    /// Checks the stream answers before handing it to the driver, retrying with backoff.
    async fn probe(&self, request: &StreamRequest) -> MusicResult<()> {
        let retries = request.reconnect.retries();
        let mut attempt = 0;

        loop {
            let result = self
                .http
                .get(&request.url)
                .header(reqwest::header::RANGE, "bytes=0-0")
                .send()
                .await;

            let failure = match result {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => format!("stream answered {}", response.status()),
                Err(e) => e.to_string(),
            };

            if attempt >= retries {
                return Err(MusicError::StreamError(failure));
            }

            attempt += 1;
            let delay = request.reconnect.backoff(attempt);
            warn!(
                "Stream probe failed ({}), retry {}/{} in {:?}",
                failure, attempt, retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn play(&self, request: StreamRequest) -> MusicResult<Completion> {
        self.probe(&request).await?;

        // The driver has no filter graph; the equalizer is carried as a pass-through
        debug!("Equalizer pass-through: {:?}", request.equalizer);

        let input: Input = HttpRequest::new(self.http.clone(), request.url.clone()).into();

        let (tx, rx) = oneshot::channel();
        let notifier = TrackEndNotifier::new(tx);

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| MusicError::StreamError(format!("Failed to watch track: {}", e)))?;
        }

        info!("Streaming started on songbird call");
        *self.current.lock().await = Some(handle);

        Ok(rx)
    }

    async fn stop(&self) -> MusicResult<()> {
        if let Some(handle) = self.current.lock().await.take() {
            // Already ended tracks refuse commands; that is fine here
            if let Err(e) = handle.stop() {
                debug!("Track was already finished when stopped: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = ReconnectPolicy::DEFAULT;
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
        assert_eq!(policy.backoff(10), Duration::from_secs(5));
    }

    #[test]
    fn retries_fit_in_max_delay() {
        // 250ms + 500ms + 1s + 2s + 4s (capped at 5s) crosses 5s on the fifth attempt
        assert_eq!(ReconnectPolicy::DEFAULT.retries(), 5);

        let disabled = ReconnectPolicy {
            reconnect: false,
            ..ReconnectPolicy::DEFAULT
        };
        assert_eq!(disabled.retries(), 0);
    }

    #[test]
    fn requests_carry_the_fixed_policies() {
        let track = Track::new("t", "https://stream", "https://src", "icon", 10);
        let request = StreamRequest::for_track(&track);

        assert_eq!(request.url, "https://stream");
        assert_eq!(request.reconnect, ReconnectPolicy::DEFAULT);
        assert_eq!(request.equalizer, Equalizer::BASS_LIFT);
    }
}
