//! Mock implementations for external dependencies
//! The resolver is a `mockall` mock; voice, sink and notifier are hand-written fakes
//! that record what the player did with them.

use async_trait::async_trait;
use mockall::mock;
use poise::serenity_prelude::{ChannelId, GuildId, MessageId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use omega_music::commands::music::audio_sources::{SourceHint, Track, TrackResolver};
use omega_music::commands::music::utils::audio_sink::{
    AudioSink, Completion, PlaybackOutcome, StreamRequest,
};
use omega_music::commands::music::utils::music_manager::{MusicError, MusicResult};
use omega_music::commands::music::utils::notifier::{StatusMessage, StatusNotifier};
use omega_music::commands::music::utils::voice_manager::VoiceGateway;

use super::fixtures;

mock! {
    pub Resolver {}

    #[async_trait]
    impl TrackResolver for Resolver {
        async fn resolve(&self, query: &str, hint: SourceHint) -> MusicResult<Track>;
    }
}

/// A resolver that finds every query, titled after the query itself.
pub fn resolver_finding_everything() -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|query, _| Ok(fixtures::track(query, 180)));
    resolver
}

/// Sink that streams nothing and finishes only when told to.
#[derive(Default)]
pub struct FakeSink {
    plays: Mutex<Vec<String>>,
    completion: Mutex<Option<oneshot::Sender<PlaybackOutcome>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    stops: AtomicUsize,
    fail_next: AtomicBool,
    stop_delay: Mutex<Duration>,
}

impl FakeSink {
    /// Stream URLs in the order they were played.
    pub fn plays(&self) -> Vec<String> {
        self.plays.lock().unwrap().clone()
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    pub fn is_streaming(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// Highest number of streams that were ever running at once.
    pub fn max_concurrent_streams(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Makes the next `play` call fail before streaming starts.
    pub fn fail_next_play(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Every following `stop` takes this long before the stream ends.
    pub fn slow_stops(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = delay;
    }

    /// Ends the current stream normally.
    pub fn finish(&self) {
        self.end(PlaybackOutcome::Finished);
    }

    /// Ends the current stream with a transport error.
    pub fn break_stream(&self, reason: &str) {
        self.end(PlaybackOutcome::Failed(reason.to_string()));
    }

    fn end(&self, outcome: PlaybackOutcome) {
        if let Some(tx) = self.completion.lock().unwrap().take() {
            self.active.fetch_sub(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        }
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, request: StreamRequest) -> MusicResult<Completion> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(MusicError::StreamError(format!("{} unreachable", request.url)));
        }

        let (tx, rx) = oneshot::channel();
        let previous = self.completion.lock().unwrap().replace(tx);
        assert!(previous.is_none(), "play called while a stream was running");

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.plays.lock().unwrap().push(request.url);

        Ok(rx)
    }

    async fn stop(&self) -> MusicResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let delay = *self.stop_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.end(PlaybackOutcome::Finished);
        Ok(())
    }
}

/// Voice transport that connects instantly and hands out one `FakeSink` per guild.
#[derive(Default)]
pub struct FakeVoiceGateway {
    sinks: Mutex<HashMap<GuildId, Arc<FakeSink>>>,
    joins: Mutex<Vec<(GuildId, ChannelId)>>,
    leaves: AtomicUsize,
    live: Mutex<Vec<GuildId>>,
    fail_joins: AtomicBool,
    join_delay: Mutex<Duration>,
}

impl FakeVoiceGateway {
    /// The sink every connection of `guild_id` plays into.
    pub fn sink(&self, guild_id: GuildId) -> Arc<FakeSink> {
        Arc::clone(self.sinks.lock().unwrap().entry(guild_id).or_default())
    }

    pub fn joins(&self) -> Vec<(GuildId, ChannelId)> {
        self.joins.lock().unwrap().clone()
    }

    pub fn leave_count(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.live.lock().unwrap().contains(&guild_id)
    }

    /// Every following join is refused.
    pub fn refuse_joins(&self) {
        self.fail_joins.store(true, Ordering::SeqCst);
    }

    /// Joins take this long to complete.
    pub fn slow_joins(&self, delay: Duration) {
        *self.join_delay.lock().unwrap() = delay;
    }

    /// Simulates Discord dropping the connection without telling the bot.
    pub fn drop_connection(&self, guild_id: GuildId) {
        self.live.lock().unwrap().retain(|g| *g != guild_id);
    }
}

#[async_trait]
impl VoiceGateway for FakeVoiceGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn AudioSink>> {
        let delay = *self.join_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(MusicError::JoinError("connection refused".to_string()));
        }

        self.joins.lock().unwrap().push((guild_id, channel_id));
        {
            let mut live = self.live.lock().unwrap();
            if !live.contains(&guild_id) {
                live.push(guild_id);
            }
        }

        Ok(self.sink(guild_id))
    }

    async fn is_live(&self, guild_id: GuildId) -> bool {
        self.is_connected(guild_id)
    }

    async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        self.drop_connection(guild_id);
        Ok(())
    }
}

/// Notifier that records what would have been posted and deleted.
#[derive(Default)]
pub struct RecordingNotifier {
    announced: Mutex<Vec<String>>,
    channels: Mutex<Vec<ChannelId>>,
    retracted: Mutex<Vec<MessageId>>,
    next_id: AtomicU64,
}

impl RecordingNotifier {
    /// Titles of the "now playing" messages, in posting order.
    pub fn announced(&self) -> Vec<String> {
        self.announced.lock().unwrap().clone()
    }

    /// Channels the "now playing" messages were posted in.
    pub fn channels(&self) -> Vec<ChannelId> {
        self.channels.lock().unwrap().clone()
    }

    pub fn retracted(&self) -> Vec<MessageId> {
        self.retracted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusNotifier for RecordingNotifier {
    async fn now_playing(&self, channel_id: ChannelId, track: &Track) -> MusicResult<StatusMessage> {
        self.announced.lock().unwrap().push(track.title().to_string());
        self.channels.lock().unwrap().push(channel_id);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StatusMessage {
            channel_id,
            message_id: MessageId::new(id),
        })
    }

    async fn retract(&self, message: StatusMessage, delay: Duration) -> MusicResult<()> {
        tokio::time::sleep(delay).await;
        self.retracted.lock().unwrap().push(message.message_id);
        Ok(())
    }
}
