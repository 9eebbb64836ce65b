use super::*;
use crate::commands::music::utils::embedded_messages;
use tracing::info;

/// Stops the playing music, clears the queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    // Waiting for the episode to wind down may take a moment
    ctx.defer().await?;

    let reply = match ctx.data().music.stop(guild_id).await {
        Ok(report) => {
            info!(
                "{} stopped the music in guild {} ({} queued track(s) dropped)",
                ctx.author().name,
                guild_id,
                report.drained
            );
            embedded_messages::stopped()
        }
        Err(err) => embedded_messages::music_error(&err),
    };

    reply_then_retract(ctx, reply).await
}
