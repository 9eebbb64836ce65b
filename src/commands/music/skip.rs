use super::*;
use crate::commands::music::utils::embedded_messages;
use tracing::info;

/// Skips the currently playing song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let reply = match ctx.data().music.skip(guild_id).await {
        Ok(track) => {
            info!("{} skipped '{}'", ctx.author().name, track.title());
            embedded_messages::skipped()
        }
        Err(err) => embedded_messages::music_error(&err),
    };

    reply_then_retract(ctx, reply).await
}
