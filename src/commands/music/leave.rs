use super::*;
use crate::commands::music::utils::embedded_messages;
use tracing::{info, warn};

/// Leave the voice channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn leave(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    ctx.defer().await?;

    let reply = match ctx.data().music.leave(guild_id).await {
        Ok(()) => {
            info!("Left voice in guild {} on request of {}", guild_id, ctx.author().name);
            embedded_messages::left_channel()
        }
        Err(err) => {
            warn!("Failed to leave voice in guild {}: {}", guild_id, err);
            embedded_messages::music_error(&err)
        }
    };

    reply_then_retract(ctx, reply).await
}
