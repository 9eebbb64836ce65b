use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};
use std::time::Duration;

use super::{format_duration, music_manager::MusicError};
use crate::commands::music::audio_sources::Track;

const PLAYER_COLOR: u32 = 0xf0f0f0;
const SUCCESS_COLOR: u32 = 0x00ff00;

const FOOTER: &str = "Jazavac™ Omega Music ©, All rights reserved";

fn duration_label(track: &Track) -> String {
    track
        .duration()
        .map(format_duration)
        .unwrap_or_else(|| "Live".to_string())
}

/// The "now playing" status message of an episode
pub fn now_playing(track: &Track) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::new("Currently playing:").icon_url(track.platform_icon()))
        .title(track.title())
        .url(track.source_url())
        .footer(CreateEmbedFooter::new(FOOTER))
        .color(PLAYER_COLOR);

    match track.thumbnail_url() {
        Some(thumbnail) => embed.image(thumbnail),
        None => embed,
    }
}

/// Confirmation that a track was queued, only shown to the requester
pub fn added_to_queue(track: &Track, position: usize) -> CreateReply {
    CreateReply::default()
        .content("Added song to queue.")
        .embed(
            CreateEmbed::new()
                .title(track.title())
                .url(track.source_url())
                .field("Duration", format!("`{}`", duration_label(track)), true)
                .field("Position", format!("`#{}`", position), true)
                .color(SUCCESS_COLOR),
        )
        .ephemeral(true)
}

/// A failed command, worded for the user
pub fn music_error(err: &MusicError) -> CreateReply {
    CreateReply::default().content(err.user_message())
}

pub fn skipped() -> CreateReply {
    CreateReply::default().content("Skipped the song.")
}

pub fn stopped() -> CreateReply {
    CreateReply::default().content("Stopped the music.")
}

pub fn left_channel() -> CreateReply {
    CreateReply::default().content("Left the voice channel.")
}

/// Listing of the current track and everything waiting behind it
pub fn music_queue(now_playing: Option<&Track>, queue: &[Track]) -> CreateEmbed {
    let mut description = String::new();

    match now_playing {
        Some(track) => {
            description.push_str("**🎵 Now Playing**\n");
            description.push_str(&format!(
                "**[{}]({})** `{}`\n\n",
                track.title(),
                track.source_url(),
                duration_label(track)
            ));
        }
        None => description.push_str("**🔇 Nothing playing**\n\n"),
    }

    if queue.is_empty() {
        description.push_str("**📭 Queue is empty**");
    } else {
        description.push_str(&format!("**📋 Queue - {} tracks**\n", queue.len()));
        for (index, track) in queue.iter().enumerate() {
            // Keycap digits for the first nine, bullets after that
            let number = if index < 9 {
                format!("{}\u{FE0F}\u{20E3}", index + 1)
            } else {
                "•".to_string()
            };

            description.push_str(&format!(
                "{} [{}]({}) `{}`\n",
                number,
                track.title(),
                track.source_url(),
                duration_label(track)
            ));
        }

        let total_duration: Duration = queue.iter().filter_map(Track::duration).sum();
        if total_duration.as_secs() > 0 {
            description.push_str(&format!(
                "\n**⏱️ Total Duration:** `{}`",
                format_duration(total_duration)
            ));
        }
    }

    CreateEmbed::new()
        .title("🎵 Music Queue")
        .description(description)
        .color(SUCCESS_COLOR)
}

