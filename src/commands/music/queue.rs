use super::*;
use crate::commands::music::utils::embedded_messages;

/// View the current music queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let view = ctx.data().music.queue(guild_id).await;
    let embed = embedded_messages::music_queue(view.now_playing.as_ref(), &view.pending);

    ctx.send(CreateReply::default().embed(embed)).await?;

    Ok(())
}
