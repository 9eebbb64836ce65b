use poise::serenity_prelude as serenity;
use serenity::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

use super::audio_sink::PlaybackOutcome;

/// Songbird event handler that forwards the end of a track to its completion channel.
///
/// Registered for both `End` and `Error`; whichever fires first consumes the sender so
/// the completion is reported exactly once.
#[derive(Clone)]
pub struct TrackEndNotifier {
    tx: Arc<Mutex<Option<oneshot::Sender<PlaybackOutcome>>>>,
}

impl TrackEndNotifier {
    pub fn new(tx: oneshot::Sender<PlaybackOutcome>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    async fn complete(&self, outcome: PlaybackOutcome) {
        let Some(tx) = self.tx.lock().await.take() else {
            return;
        };
        if tx.send(outcome).is_err() {
            warn!("Track ended but nobody is waiting for it anymore");
        }
    }
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &songbird::EventContext<'_>) -> Option<songbird::Event> {
        if let songbird::EventContext::Track(tracks) = ctx {
            let failure = tracks.iter().find_map(|(state, _)| match &state.playing {
                songbird::tracks::PlayMode::Errored(e) => Some(e.to_string()),
                _ => None,
            });

            match failure {
                Some(reason) => {
                    warn!("Track errored: {}", reason);
                    self.complete(PlaybackOutcome::Failed(reason)).await;
                }
                None => {
                    info!("Track ended");
                    self.complete(PlaybackOutcome::Finished).await;
                }
            }
        }
        None
    }
}
