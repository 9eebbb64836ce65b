//! This module aggregates all the command modules for the bot.

/// General purpose commands (e.g., ping).
pub mod general;
/// Commands related to music playback.
pub mod music;
