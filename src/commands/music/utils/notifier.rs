//! Status messages posted to the guild's text channel while tracks play.

use poise::serenity_prelude as serenity;
use serenity::all::CreateMessage;
use serenity::async_trait;
use serenity::{ChannelId, MessageId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::embedded_messages;
use super::music_manager::{MusicError, MusicResult};
use crate::commands::music::audio_sources::Track;

/// Handle of a posted status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

#[async_trait]
pub trait StatusNotifier: Send + Sync {
    /// Posts the "now playing" message for a track.
    async fn now_playing(&self, channel_id: ChannelId, track: &Track) -> MusicResult<StatusMessage>;

    /// Deletes a status message after `delay`.
    async fn retract(&self, message: StatusMessage, delay: Duration) -> MusicResult<()>;
}

/// Notifier talking to Discord over the REST API.
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl StatusNotifier for DiscordNotifier {
    async fn now_playing(&self, channel_id: ChannelId, track: &Track) -> MusicResult<StatusMessage> {
        let message = CreateMessage::new().embed(embedded_messages::now_playing(track));

        let sent = channel_id
            .send_message(&*self.http, message)
            .await
            .map_err(|e| MusicError::NotificationError(e.to_string()))?;

        debug!("Posted now playing message {} in {}", sent.id, channel_id);
        Ok(StatusMessage {
            channel_id,
            message_id: sent.id,
        })
    }

    async fn retract(&self, message: StatusMessage, delay: Duration) -> MusicResult<()> {
        tokio::time::sleep(delay).await;

        message
            .channel_id
            .delete_message(&self.http, message.message_id)
            .await
            .map_err(|e| {
                warn!(
                    "Failed to delete message {} in {}: {}",
                    message.message_id, message.channel_id, e
                );
                MusicError::NotificationError(e.to_string())
            })
    }
}
