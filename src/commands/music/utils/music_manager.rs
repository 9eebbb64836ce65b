use dashmap::DashMap;
use futures::future::join_all;
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, GuildId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::guild_player::{GuildPlayer, PlaybackState, StopReport};
use super::notifier::StatusNotifier;
use super::voice_manager::{VoiceGateway, VoiceSessionManager, VoiceSessionState};
use crate::commands::music::audio_sources::{SourceHint, Track, TrackResolver};
use crate::config::PlayerConfig;

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("No track found for: {0}")]
    TrackNotFound(String),

    #[error("Track resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Track resolution timed out after {0:?}")]
    ResolutionTimedOut(Duration),

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Queue is full ({0} tracks)")]
    QueueFull(usize),

    #[error("Nothing is playing")]
    NothingPlaying,

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MusicError {
    /// Text shown to the user who issued the failing command.
    pub fn user_message(&self) -> String {
        match self {
            Self::TrackNotFound(_)
            | Self::ResolutionFailed(_)
            | Self::ExternalApiError(_)
            | Self::ResolutionTimedOut(_) => "Couldn't find the song.".to_string(),
            Self::UserNotInVoiceChannel | Self::JoinError(_) => {
                "You must be in a voice channel to use this command.".to_string()
            }
            Self::NothingPlaying => "There is no music playing.".to_string(),
            Self::NotConnected => "I'm not in a voice channel.".to_string(),
            Self::NotInGuild => "This command only works in a server.".to_string(),
            Self::QueueFull(capacity) => {
                format!("The queue is full ({} songs), try again later.", capacity)
            }
            Self::StreamError(_)
            | Self::NotificationError(_)
            | Self::ConfigError(_) => "Something went wrong, please try again.".to_string(),
        }
    }
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// A `/play` request as seen by the player.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    /// Voice channel of the requester, `None` when they are not in one.
    pub voice_channel: Option<ChannelId>,
    /// Text channel where the command was issued.
    pub reply_channel: ChannelId,
    pub query: String,
    pub source: SourceHint,
}

/// A successfully queued track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub track: Track,
    /// 1-based position in the queue at the time of queueing.
    pub position: usize,
}

/// Read-only view of a guild's player for the queue listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueView {
    pub now_playing: Option<Track>,
    pub pending: Vec<Track>,
    pub state: PlaybackState,
}

/// Owns every guild's player and the services they share.
pub struct MusicManager {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    resolver: Arc<dyn TrackResolver>,
    voice: Arc<VoiceSessionManager>,
    notifier: Arc<dyn StatusNotifier>,
    config: PlayerConfig,
}

impl MusicManager {
    pub fn new(
        resolver: Arc<dyn TrackResolver>,
        gateway: Arc<dyn VoiceGateway>,
        notifier: Arc<dyn StatusNotifier>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            players: DashMap::new(),
            resolver,
            voice: Arc::new(VoiceSessionManager::new(gateway)),
            notifier,
            config,
        }
    }

    /// The guild's player, created on first use.
    pub fn player(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        let entry = self.players.entry(guild_id).or_insert_with(|| {
            debug!("Creating player for guild {}", guild_id);
            Arc::new(GuildPlayer::new(
                guild_id,
                Arc::clone(&self.voice),
                Arc::clone(&self.notifier),
                self.config.clone(),
            ))
        });
        Arc::clone(entry.value())
    }

    fn existing_player(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|p| Arc::clone(p.value()))
    }

    /// Resolves a query, makes sure the bot is in the requester's channel and queues the
    /// track. Playback starts right away if the guild was idle.
    ///
    /// Nothing is queued when resolution or the voice connection fails.
    pub async fn play(&self, request: PlayRequest) -> MusicResult<Enqueued> {
        let guild_id = request.guild_id;

        // Checked up front so nobody waits on a lookup that can't be played
        let Some(voice_channel) = request.voice_channel else {
            info!("Play request in guild {} from outside voice", guild_id);
            return Err(MusicError::UserNotInVoiceChannel);
        };

        let track = self.resolve(&request.query, request.source).await?;

        self.voice.ensure_connected(guild_id, Some(voice_channel)).await?;

        let player = self.player(guild_id);
        player.set_announce_channel(request.reply_channel).await;
        let position = player.enqueue(track.clone()).await?;

        info!(
            "Queued '{}' at position {} in guild {}",
            track.title(),
            position,
            guild_id
        );
        Ok(Enqueued { track, position })
    }

    async fn resolve(&self, query: &str, source: SourceHint) -> MusicResult<Track> {
        let deadline = self.config.resolve_timeout;
        match tokio::time::timeout(deadline, self.resolver.resolve(query, source)).await {
            Ok(Ok(track)) => Ok(track),
            Ok(Err(e)) => {
                warn!("Could not resolve '{}' via {:?}: {}", query, source, e);
                Err(e)
            }
            Err(_) => {
                warn!("Resolving '{}' took longer than {:?}", query, deadline);
                Err(MusicError::ResolutionTimedOut(deadline))
            }
        }
    }

    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<Track> {
        self.existing_player(guild_id)
            .ok_or(MusicError::NothingPlaying)?
            .skip()
            .await
    }

    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<StopReport> {
        self.existing_player(guild_id)
            .ok_or(MusicError::NothingPlaying)?
            .stop()
            .await
    }

    /// Stops playback, leaves the voice channel and forgets the guild's player.
    pub async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        if let Some((_, player)) = self.players.remove(&guild_id) {
            match player.stop().await {
                Ok(report) => debug!("Stopped guild {} before leaving: {:?}", guild_id, report),
                Err(MusicError::NothingPlaying) => {}
                Err(e) => warn!("Failed to stop guild {} before leaving: {}", guild_id, e),
            }
        }

        self.voice.disconnect(guild_id).await
    }

    pub async fn queue(&self, guild_id: GuildId) -> QueueView {
        match self.existing_player(guild_id) {
            Some(player) => QueueView {
                now_playing: player.now_playing().await,
                pending: player.queue().snapshot().await,
                state: player.state(),
            },
            None => QueueView {
                now_playing: None,
                pending: Vec::new(),
                state: PlaybackState::Idle,
            },
        }
    }

    pub fn state(&self, guild_id: GuildId) -> PlaybackState {
        self.existing_player(guild_id)
            .map(|player| player.state())
            .unwrap_or(PlaybackState::Idle)
    }

    pub async fn voice_state(&self, guild_id: GuildId) -> VoiceSessionState {
        self.voice.state(guild_id).await
    }

    /// Tears down every guild session.
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildId> = self.players.iter().map(|entry| *entry.key()).collect();
        info!("Shutting down {} guild session(s)", guilds.len());

        let results = join_all(guilds.into_iter().map(|guild_id| async move {
            (guild_id, self.leave(guild_id).await)
        }))
        .await;

        for (guild_id, result) in results {
            match result {
                Ok(()) | Err(MusicError::NotConnected) => {}
                Err(e) => warn!("Failed to tear down guild {}: {}", guild_id, e),
            }
        }
    }
}
