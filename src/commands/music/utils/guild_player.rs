//! Playback controller of a single guild.
//!
//! A guild is `Playing` while its playing lock (a one-permit semaphore) is held. The
//! permit is owned by the episode task, which plays tracks back to back until the
//! queue runs dry or a stop is raised, and then releases it. Whoever releases the permit
//! looks at the queue once more so a track enqueued during the hand-over is never left
//! behind.

use poise::serenity_prelude as serenity;
use serenity::{ChannelId, GuildId};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::audio_sink::{AudioSink, Completion, PlaybackOutcome, StreamRequest};
use super::music_manager::{MusicError, MusicResult};
use super::notifier::{StatusMessage, StatusNotifier};
use super::queue_manager::PlaybackQueue;
use super::voice_manager::{VoiceHandle, VoiceSessionManager};
use crate::commands::music::audio_sources::Track;
use crate::config::PlayerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// What `stop` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Pending tracks that were discarded.
    pub drained: usize,
    /// The track that was interrupted, if one was streaming.
    pub stopped: Option<Track>,
}

/// The track currently handed to the sink.
struct NowPlaying {
    track: Track,
    sink: Arc<dyn AudioSink>,
    status: Option<StatusMessage>,
    skip: Option<oneshot::Sender<()>>,
}

pub struct GuildPlayer {
    guild_id: GuildId,
    queue: PlaybackQueue,
    playing: Arc<Semaphore>,
    now_playing: Mutex<Option<NowPlaying>>,
    announce_channel: Mutex<Option<ChannelId>>,
    /// Channel of the last live connection, rejoined if it drops mid-queue.
    voice_channel: Mutex<Option<ChannelId>>,
    /// Bumped by `stop` to end the running episode.
    halt: watch::Sender<u64>,
    /// Bumped every time an episode task releases the playing lock.
    runs: watch::Sender<u64>,
    /// Held while a run subscribes and takes the lock, and while `stop` raises the halt.
    control: std::sync::Mutex<()>,
    voice: Arc<VoiceSessionManager>,
    notifier: Arc<dyn StatusNotifier>,
    config: PlayerConfig,
}

impl GuildPlayer {
    pub fn new(
        guild_id: GuildId,
        voice: Arc<VoiceSessionManager>,
        notifier: Arc<dyn StatusNotifier>,
        config: PlayerConfig,
    ) -> Self {
        let (halt, _) = watch::channel(0);
        let (runs, _) = watch::channel(0);
        Self {
            guild_id,
            queue: PlaybackQueue::new(config.queue_capacity),
            playing: Arc::new(Semaphore::new(1)),
            now_playing: Mutex::new(None),
            announce_channel: Mutex::new(None),
            voice_channel: Mutex::new(None),
            halt,
            runs,
            control: std::sync::Mutex::new(()),
            voice,
            notifier,
            config,
        }
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    /// Reading the state never touches the lock itself.
    pub fn state(&self) -> PlaybackState {
        if self.playing.available_permits() == 0 {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub async fn now_playing(&self) -> Option<Track> {
        self.now_playing
            .lock()
            .await
            .as_ref()
            .map(|np| np.track.clone())
    }

    /// Text channel where "now playing" messages go.
    pub async fn set_announce_channel(&self, channel_id: ChannelId) {
        *self.announce_channel.lock().await = Some(channel_id);
    }

    /// Queues a track and starts playback if the guild is idle.
    pub async fn enqueue(self: &Arc<Self>, track: Track) -> MusicResult<usize> {
        let position = self.queue.enqueue(track).await?;
        self.start_playback();
        Ok(position)
    }

    /// Starts an episode unless one is already running. Returns whether one was started.
    pub fn start_playback(self: &Arc<Self>) -> bool {
        let (permit, halt) = {
            let _control = self.control();
            // Subscribed before the lock is taken so any later stop reaches this run
            let halt = self.halt.subscribe();
            match Arc::clone(&self.playing).try_acquire_owned() {
                Ok(permit) => (permit, halt),
                Err(_) => {
                    debug!("Guild {} is already playing", self.guild_id);
                    return false;
                }
            }
        };

        let player = Arc::clone(self);
        tokio::spawn(async move { player.run_episodes(permit, halt).await });
        true
    }

    fn control(&self) -> MutexGuard<'_, ()> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_episodes(
        self: Arc<Self>,
        permit: OwnedSemaphorePermit,
        mut halt: watch::Receiver<u64>,
    ) {
        info!("Playback started for guild {}", self.guild_id);

        loop {
            // No track is taken off the queue without somewhere to play it
            let Some(handle) = self.voice_handle().await else {
                break;
            };

            if halt.has_changed().unwrap_or(true) {
                debug!("Playback of guild {} was halted", self.guild_id);
                break;
            }

            let Some(track) = self.queue.try_dequeue().await else {
                break;
            };

            if self.play_episode(track, handle, &mut halt).await {
                debug!("Playback of guild {} was halted", self.guild_id);
                break;
            }
        }

        drop(permit);
        self.runs.send_modify(|count| *count = count.wrapping_add(1));
        info!("Playback idle for guild {}", self.guild_id);

        if !self.queue.is_empty().await && self.voice.current(self.guild_id).await.is_some() {
            debug!("Track arrived while guild {} went idle", self.guild_id);
            self.start_playback();
        }
    }

    /// Live voice handle of the guild. A connection that dropped while tracks are
    /// waiting is rejoined in the last channel; if that fails the queue is discarded.
    async fn voice_handle(&self) -> Option<VoiceHandle> {
        if let Some(handle) = self.voice.current(self.guild_id).await {
            *self.voice_channel.lock().await = Some(handle.channel_id);
            return Some(handle);
        }

        if self.queue.is_empty().await {
            return None;
        }

        let Some(channel_id) = *self.voice_channel.lock().await else {
            warn!(
                "Guild {} has queued tracks but no live voice connection",
                self.guild_id
            );
            return None;
        };

        warn!(
            "Voice connection of guild {} dropped, rejoining channel {}",
            self.guild_id, channel_id
        );
        match self.voice.ensure_connected(self.guild_id, Some(channel_id)).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                let discarded = self.queue.drain().await;
                error!(
                    "Could not rejoin voice in guild {}, discarded {} queued track(s): {}",
                    self.guild_id, discarded, e
                );
                None
            }
        }
    }

    /// Plays one track to its end. Returns whether the episode was halted by `stop`.
    async fn play_episode(
        &self,
        track: Track,
        handle: VoiceHandle,
        halt: &mut watch::Receiver<u64>,
    ) -> bool {
        let (skip_tx, skip_rx) = oneshot::channel();
        *self.now_playing.lock().await = Some(NowPlaying {
            track: track.clone(),
            sink: Arc::clone(&handle.sink),
            status: None,
            skip: Some(skip_tx),
        });

        info!("Guild {} now playing: {}", self.guild_id, track.title());

        let halted = match handle.sink.play(StreamRequest::for_track(&track)).await {
            Ok(completion) => {
                self.announce(&track).await;
                self.await_completion(&track, completion, skip_rx, halt).await
            }
            Err(e) => {
                error!(
                    "Failed to stream '{}' in guild {}: {}",
                    track.title(),
                    self.guild_id,
                    e
                );
                false
            }
        };

        if let Err(e) = handle.sink.stop().await {
            warn!("Failed to stop sink in guild {}: {}", self.guild_id, e);
        }

        let finished = self.now_playing.lock().await.take();
        if let Some(status) = finished.and_then(|np| np.status) {
            self.retract_later(status, self.config.status_retract_delay);
        }

        halted
    }

    async fn await_completion(
        &self,
        track: &Track,
        completion: Completion,
        skip: oneshot::Receiver<()>,
        halt: &mut watch::Receiver<u64>,
    ) -> bool {
        let watchdog = self.config.watchdog_for(track.duration_seconds());

        tokio::select! {
            outcome = completion => {
                match outcome {
                    Ok(PlaybackOutcome::Finished) => {
                        info!("Finished '{}' in guild {}", track.title(), self.guild_id);
                    }
                    Ok(PlaybackOutcome::Failed(reason)) => {
                        error!("Stream of '{}' failed in guild {}: {}", track.title(), self.guild_id, reason);
                    }
                    Err(_) => {
                        warn!("Sink of guild {} dropped its completion", self.guild_id);
                    }
                }
                false
            }
            _ = skip => {
                info!("Skipped '{}' in guild {}", track.title(), self.guild_id);
                false
            }
            _ = halt.changed() => {
                info!("Stopped '{}' in guild {}", track.title(), self.guild_id);
                true
            }
            _ = tokio::time::sleep(watchdog) => {
                error!(
                    "No completion for '{}' in guild {} after {:?}, ending it",
                    track.title(),
                    self.guild_id,
                    watchdog
                );
                false
            }
        }
    }

    async fn announce(&self, track: &Track) {
        let Some(channel_id) = *self.announce_channel.lock().await else {
            debug!("No announce channel for guild {}", self.guild_id);
            return;
        };

        match self.notifier.now_playing(channel_id, track).await {
            Ok(status) => match self.now_playing.lock().await.as_mut() {
                Some(np) => np.status = Some(status),
                None => self.retract_later(status, Duration::ZERO),
            },
            Err(e) => warn!(
                "Could not announce '{}' in guild {}: {}",
                track.title(),
                self.guild_id,
                e
            ),
        }
    }

    fn retract_later(&self, status: StatusMessage, delay: Duration) {
        let notifier = Arc::clone(&self.notifier);
        let guild_id = self.guild_id;
        tokio::spawn(async move {
            if let Err(e) = notifier.retract(status, delay).await {
                warn!("Could not retract status message in guild {}: {}", guild_id, e);
            }
        });
    }

    /// Ends the current track; the episode moves on to the next one.
    pub async fn skip(&self) -> MusicResult<Track> {
        let (track, sink, skip) = {
            let mut now_playing = self.now_playing.lock().await;
            let np = now_playing.as_mut().ok_or(MusicError::NothingPlaying)?;
            (np.track.clone(), Arc::clone(&np.sink), np.skip.take())
        };

        if let Some(skip) = skip {
            // The episode may have finished on its own in the meantime
            let _ = skip.send(());
        }
        if let Err(e) = sink.stop().await {
            warn!("Failed to stop sink in guild {}: {}", self.guild_id, e);
        }

        info!("Skip requested in guild {}: {}", self.guild_id, track.title());
        Ok(track)
    }

    /// Drains the queue, ends the current track and waits for the running episode task
    /// to wind down. Tracks queued while stopping play afterwards in a fresh episode.
    pub async fn stop(self: &Arc<Self>) -> MusicResult<StopReport> {
        let drained = self.queue.drain().await;

        let current = self
            .now_playing
            .lock()
            .await
            .as_mut()
            .map(|np| (np.track.clone(), Arc::clone(&np.sink), np.status.take()));

        if drained == 0 && current.is_none() && !self.is_playing() {
            return Err(MusicError::NothingPlaying);
        }

        // Only the run holding the lock right now has to be waited for
        let (mut run_ended, running) = {
            let _control = self.control();
            let run_ended = self.runs.subscribe();
            let running = self.is_playing();
            self.halt
                .send_modify(|generation| *generation = generation.wrapping_add(1));
            (run_ended, running)
        };

        let stopped = match current {
            Some((track, sink, status)) => {
                if let Err(e) = sink.stop().await {
                    warn!("Failed to stop sink in guild {}: {}", self.guild_id, e);
                }
                if let Some(status) = status {
                    self.retract_later(status, Duration::ZERO);
                }
                Some(track)
            }
            None => None,
        };

        if running && run_ended.changed().await.is_err() {
            error!("Episode tracker of guild {} is gone", self.guild_id);
        }

        if !self.queue.is_empty().await {
            debug!("Tracks queued during stop in guild {}", self.guild_id);
            self.start_playback();
        }

        info!(
            "Stopped playback in guild {} ({} pending track(s) discarded)",
            self.guild_id, drained
        );
        Ok(StopReport { drained, stopped })
    }
}
