pub mod leave;
pub mod play;
pub mod queue;
pub mod skip;
pub mod stop;

pub mod audio_sources;
pub mod utils;

use poise::{CreateReply, serenity_prelude as serenity};
use serenity::{ChannelId, GuildId};
use tracing::warn;

use crate::{CommandResult, Context};
use utils::music_manager::{MusicError, MusicResult};

/// Voice channel the command author is sitting in, according to the cache.
pub(crate) fn user_voice_channel(
    ctx: Context<'_>,
    guild_id: GuildId,
) -> MusicResult<Option<ChannelId>> {
    let guild = ctx
        .serenity_context()
        .cache
        .guild(guild_id)
        .ok_or(MusicError::NotInGuild)?;

    Ok(guild
        .voice_states
        .get(&ctx.author().id)
        .and_then(|state| state.channel_id))
}

/// Sends a short reply and deletes it again after the configured delay.
pub(crate) async fn reply_then_retract(ctx: Context<'_>, reply: CreateReply) -> CommandResult {
    let handle = ctx.send(reply).await?;

    tokio::time::sleep(ctx.data().config.player.reply_retract_delay).await;

    if let Err(e) = handle.delete(ctx).await {
        warn!("Failed to delete command reply: {}", e);
    }

    Ok(())
}
