//! Common test utilities, fixtures, and mocks
//! Shared by every integration test crate; not all of them use everything.
#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tracing::Level;

use omega_music::commands::music::audio_sources::TrackResolver;
use omega_music::commands::music::utils::music_manager::MusicManager;
use omega_music::config::PlayerConfig;

use mocks::{FakeSink, FakeVoiceGateway, RecordingNotifier};

static INIT: Once = Once::new();

/// Initialize tracing for tests
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

/// Polls `condition` until it holds, failing the test after a few seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for: {}", what);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A music manager wired to in-memory voice, sink and notifier fakes.
pub struct Harness {
    pub manager: Arc<MusicManager>,
    pub gateway: Arc<FakeVoiceGateway>,
    /// Sink of `fixtures::GUILD`.
    pub sink: Arc<FakeSink>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(resolver: impl TrackResolver + 'static) -> Self {
        Self::with_config(resolver, fixtures::player_config())
    }

    pub fn with_config(resolver: impl TrackResolver + 'static, config: PlayerConfig) -> Self {
        init();
        let gateway = Arc::new(FakeVoiceGateway::default());
        let sink = gateway.sink(fixtures::GUILD);
        let notifier = Arc::new(RecordingNotifier::default());

        let manager = Arc::new(MusicManager::new(
            Arc::new(resolver),
            gateway.clone(),
            notifier.clone(),
            config,
        ));

        Self {
            manager,
            gateway,
            sink,
            notifier,
        }
    }
}
