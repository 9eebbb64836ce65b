//! Omega Music: a per-guild voice music player for Discord.
//!
//! The crate is split the same way the bot is wired at runtime: `commands` holds the
//! poise slash commands and everything music related underneath them, while `config`
//! holds the environment driven settings shared by all of it.

use std::sync::{Arc, LazyLock};

pub mod commands;
pub mod config;

use commands::music::utils::music_manager::MusicManager;
use config::Config;

/// Shared HTTP client for Spotify and stream probing.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
#[derive(Clone)]
pub struct Data {
    pub config: Arc<Config>,
    pub music: Arc<MusicManager>,
}
