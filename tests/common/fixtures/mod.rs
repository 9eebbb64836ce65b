//! Sample tracks, ids and configurations used in tests

use poise::serenity_prelude::{ChannelId, GuildId};
use std::time::Duration;

use omega_music::commands::music::audio_sources::{SourceHint, Track};
use omega_music::commands::music::utils::music_manager::PlayRequest;
use omega_music::config::PlayerConfig;

pub const GUILD: GuildId = GuildId::new(111_111_111);
pub const OTHER_GUILD: GuildId = GuildId::new(222_222_222);
pub const VOICE_CHANNEL: ChannelId = ChannelId::new(333_333_333);
pub const OTHER_VOICE_CHANNEL: ChannelId = ChannelId::new(444_444_444);
pub const TEXT_CHANNEL: ChannelId = ChannelId::new(555_555_555);

pub const YOUTUBE_ICON: &str = "https://icons.example/youtube.png";

/// A resolved track whose stream URL is derived from its title.
pub fn track(title: &str, duration_seconds: u64) -> Track {
    Track::new(
        title,
        format!("https://stream.example/{}", title.replace(' ', "-")),
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        YOUTUBE_ICON,
        duration_seconds,
    )
}

/// Stream URL `track(title, _)` hands to the sink.
pub fn stream_url(title: &str) -> String {
    format!("https://stream.example/{}", title.replace(' ', "-"))
}

/// A `/play` request from someone sitting in `VOICE_CHANNEL`.
pub fn play_request(query: &str) -> PlayRequest {
    PlayRequest {
        guild_id: GUILD,
        voice_channel: Some(VOICE_CHANNEL),
        reply_channel: TEXT_CHANNEL,
        query: query.to_string(),
        source: SourceHint::Youtube,
    }
}

/// Player settings with no artificial delays.
pub fn player_config() -> PlayerConfig {
    PlayerConfig {
        queue_capacity: 150,
        resolve_timeout: Duration::from_secs(2),
        status_retract_delay: Duration::ZERO,
        reply_retract_delay: Duration::ZERO,
        watchdog_grace: Duration::from_secs(30),
        watchdog_unknown_duration: Duration::from_secs(60),
    }
}
