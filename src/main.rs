use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{
    coordinator::PlaybackCoordinator, events::EventSink, player::SongbirdPlayer, queue::RoomState,
};
use crate::bot::{events::Announcer, JukeboxBot};
use crate::config::Config;
use crate::sources::{SmartSource, SpotifyClient, YtDlpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let ytdlp = Arc::new(
        YtDlpClient::new(config.ytdlp_path.clone()).with_timeout(config.resolve_timeout()),
    );

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        ytdlp.verify_dependencies().await?;
        println!("OK");
        return Ok(());
    }

    if let Err(e) = ytdlp.verify_dependencies().await {
        warn!("⚠️ yt-dlp no disponible, las búsquedas fallarán: {:?}", e);
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("guild-jukebox/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let spotify = config.spotify_credentials().map(|(id, secret)| {
        info!("🟢 Spotify habilitado");
        Arc::new(SpotifyClient::new(http.clone(), id.to_string(), secret.to_string()))
    });
    let resolver = Arc::new(SmartSource::new(ytdlp, spotify));

    let songbird = Songbird::serenity();
    let player = Arc::new(SongbirdPlayer::new(songbird.clone(), http));

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let coordinator = PlaybackCoordinator::new(
        resolver,
        player,
        EventSink::new(event_tx),
        config.coordinator_settings(),
    );

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let announce_channels = JukeboxBot::announce_channels();
    let handler = JukeboxBot::new(config.clone(), coordinator.clone(), announce_channels.clone());

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let announcer = Announcer::new(client.http.clone(), announce_channels, config.prefix.clone());
    tokio::spawn(announcer.run(event_rx));
    tokio::spawn(maintenance_tasks(coordinator, config.maintenance_interval()));

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Señal de shutdown recibida, cerrando...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Error al registrar Ctrl+C: {:?}", e),
        }
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

/// Registra periódicamente el estado de las salas conocidas
///
/// Rooms are never evicted; this only reports how many exist and how long
/// the oldest idle one has been untouched.
async fn maintenance_tasks(coordinator: Arc<PlaybackCoordinator>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        interval.tick().await;

        let activity = coordinator.room_activity().await;
        let playing = activity
            .iter()
            .filter(|room| room.state == RoomState::Playing)
            .count();
        let oldest_idle = activity
            .iter()
            .filter(|room| room.state == RoomState::Idle)
            .min_by_key(|room| room.last_activity);

        match oldest_idle {
            Some(room) => {
                let idle_for = (chrono::Utc::now() - room.last_activity)
                    .to_std()
                    .unwrap_or_default();
                info!(
                    "🧹 {} salas ({} reproduciendo); guild {} inactiva desde hace {}",
                    coordinator.room_count(),
                    playing,
                    room.room,
                    humantime::format_duration(Duration::from_secs(idle_for.as_secs()))
                );
            }
            None => info!(
                "🧹 {} salas ({} reproduciendo)",
                coordinator.room_count(),
                playing
            ),
        }
    }
}
