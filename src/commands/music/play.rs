use super::*;
use crate::commands::music::audio_sources::SourceHint;
use crate::commands::music::utils::{embedded_messages, music_manager::PlayRequest};
use tracing::{info, warn};

/// Play a song from Spotify or YouTube
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Song name or link"] song: String,
    #[description = "Where to look the song up"] platform: SourceHint,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    info!(
        "Play request in guild {} from {}: {} ({:?})",
        guild_id,
        ctx.author().name,
        song,
        platform
    );

    // Resolving can take longer than the interaction deadline
    ctx.defer().await?;

    let voice_channel = user_voice_channel(ctx, guild_id)?;
    if voice_channel.is_none() {
        info!(
            "{} tried to play music without being in a voice channel",
            ctx.author().name
        );
    }

    let request = PlayRequest {
        guild_id,
        voice_channel,
        reply_channel: ctx.channel_id(),
        query: song,
        source: platform,
    };

    let reply = match ctx.data().music.play(request).await {
        Ok(enqueued) => embedded_messages::added_to_queue(&enqueued.track, enqueued.position),
        Err(err) => {
            warn!("Play request in guild {} failed: {}", guild_id, err);
            embedded_messages::music_error(&err)
        }
    };

    reply_then_retract(ctx, reply).await
}
