//! Per-guild voice connections.
//!
//! The manager tracks at most one session per guild and hands out the sink bound to it.
//! The actual transport sits behind [`VoiceGateway`] so the controller can be exercised
//! without a Discord connection.

use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::{ChannelId, GuildId};
use songbird::Songbird;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::audio_sink::{AudioSink, SongbirdSink};
use super::music_manager::{MusicError, MusicResult};
use crate::HTTP_CLIENT;

/// Voice transport used by the session manager.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Joins (or moves to) `channel_id` and returns the sink of that connection.
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId)
    -> MusicResult<Arc<dyn AudioSink>>;

    /// Whether the transport still holds a live connection for the guild.
    async fn is_live(&self, guild_id: GuildId) -> bool;

    /// Closes the guild's connection, if any.
    async fn leave(&self, guild_id: GuildId) -> MusicResult<()>;
}

/// Live connection to one voice channel.
#[derive(Clone)]
pub struct VoiceHandle {
    pub channel_id: ChannelId,
    pub sink: Arc<dyn AudioSink>,
}

impl std::fmt::Debug for VoiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceHandle")
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceSessionState {
    Disconnected,
    Connected(ChannelId),
}

type SessionSlot = Arc<Mutex<Option<VoiceHandle>>>;

/// Owns the voice session of every guild.
pub struct VoiceSessionManager {
    gateway: Arc<dyn VoiceGateway>,
    sessions: DashMap<GuildId, SessionSlot>,
}

impl VoiceSessionManager {
    pub fn new(gateway: Arc<dyn VoiceGateway>) -> Self {
        Self {
            gateway,
            sessions: DashMap::new(),
        }
    }

    fn slot(&self, guild_id: GuildId) -> SessionSlot {
        Arc::clone(self.sessions.entry(guild_id).or_default().value())
    }

    /// Makes sure the bot sits in the requester's voice channel.
    ///
    /// Joins when there is no session, moves when the requester is elsewhere and rejoins
    /// when the transport dropped the connection behind our back. Attempts for the same
    /// guild are serialized.
    pub async fn ensure_connected(
        &self,
        guild_id: GuildId,
        requested: Option<ChannelId>,
    ) -> MusicResult<VoiceHandle> {
        let channel_id = requested.ok_or(MusicError::UserNotInVoiceChannel)?;

        let slot = self.slot(guild_id);
        let mut session = slot.lock().await;

        if let Some(handle) = session.as_ref() {
            if self.gateway.is_live(guild_id).await {
                if handle.channel_id == channel_id {
                    debug!("Guild {} already connected to {}", guild_id, channel_id);
                    return Ok(handle.clone());
                }
                info!(
                    "Moving guild {} from channel {} to {}",
                    guild_id, handle.channel_id, channel_id
                );
            } else {
                warn!("Voice session of guild {} went stale, reconnecting", guild_id);
                // Whatever is left of the old connection goes before joining again
                if let Err(e) = self.gateway.leave(guild_id).await {
                    debug!("Dropping stale session of guild {}: {}", guild_id, e);
                }
                *session = None;
            }
        }

        let sink = match self.gateway.join(guild_id, channel_id).await {
            Ok(sink) => sink,
            Err(e) => {
                error!(
                    "Failed to join voice channel {} for guild {}: {}",
                    channel_id, guild_id, e
                );
                *session = None;
                return Err(match e {
                    MusicError::JoinError(_) => e,
                    other => MusicError::JoinError(other.to_string()),
                });
            }
        };

        let handle = VoiceHandle { channel_id, sink };
        *session = Some(handle.clone());
        info!("Guild {} connected to voice channel {}", guild_id, channel_id);

        Ok(handle)
    }

    /// The live handle of the guild, if it has one.
    pub async fn current(&self, guild_id: GuildId) -> Option<VoiceHandle> {
        let slot = self.sessions.get(&guild_id).map(|s| Arc::clone(s.value()))?;
        let handle = slot.lock().await.clone()?;

        if self.gateway.is_live(guild_id).await {
            Some(handle)
        } else {
            None
        }
    }

    pub async fn state(&self, guild_id: GuildId) -> VoiceSessionState {
        match self.current(guild_id).await {
            Some(handle) => VoiceSessionState::Connected(handle.channel_id),
            None => VoiceSessionState::Disconnected,
        }
    }

    /// Leaves the guild's voice channel and forgets the session.
    pub async fn disconnect(&self, guild_id: GuildId) -> MusicResult<()> {
        let Some((_, slot)) = self.sessions.remove(&guild_id) else {
            return Err(MusicError::NotConnected);
        };

        let had_session = slot.lock().await.take().is_some();
        if !had_session {
            return Err(MusicError::NotConnected);
        }

        self.gateway.leave(guild_id).await?;
        info!("Guild {} left its voice channel", guild_id);
        Ok(())
    }
}

/// Voice transport backed by songbird.
pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self { songbird }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn AudioSink>> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;

        Ok(Arc::new(SongbirdSink::new(call, HTTP_CLIENT.clone())))
    }

    async fn is_live(&self, guild_id: GuildId) -> bool {
        match self.songbird.get(guild_id) {
            Some(call) => call.lock().await.current_connection().is_some(),
            None => false,
        }
    }

    async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        if self.songbird.get(guild_id).is_none() {
            return Err(MusicError::NotConnected);
        }

        self.songbird
            .remove(guild_id)
            .await
            .map_err(|e| MusicError::JoinError(format!("Failed to leave voice channel: {}", e)))
    }
}
