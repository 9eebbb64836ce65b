use ::serenity::all::ClientBuilder;
use poise::serenity_prelude as serenity;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use omega_music::commands::{
    general::ping::*,
    music::{
        audio_sources::AudioSources,
        leave::*,
        play::*,
        queue::*,
        skip::*,
        stop::*,
        utils::{
            music_manager::MusicManager, notifier::DiscordNotifier, voice_manager::SongbirdGateway,
        },
    },
};
use omega_music::config::Config;
use omega_music::{CommandResult, Context, Data, Error};

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("omega_music=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    let config = Config::from_env()?;
    info!("Starting with {}", config.summary());

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let http = Arc::new(serenity::Http::new(&config.discord_token));

    let music = Arc::new(MusicManager::new(
        Arc::new(AudioSources::from_config(&config)),
        Arc::new(SongbirdGateway::new(Arc::clone(&songbird))),
        Arc::new(DiscordNotifier::new(http)),
        config.player.clone(),
    ));

    let data = Data {
        config: Arc::new(config.clone()),
        music: Arc::clone(&music),
    };

    let commands = vec![
        // Default commands
        register(),
        help(),
        // General commands
        ping(),
        // Music commands
        play(),
        skip(),
        stop(),
        leave(),
        queue(),
    ];

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        });

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework.build())
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Could not listen for Ctrl-C: {}", e),
        }
    });

    let result = client.start().await;

    music.shutdown().await;
    info!("Goodbye");

    result.map_err(Into::into)
}
