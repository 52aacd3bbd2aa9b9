//! # Bot Module
//!
//! Discord front end for Guild Jukebox.
//!
//! - Prefix text commands parsed into [`commands::Command`] and dispatched to the
//!   [`PlaybackCoordinator`]
//! - Voice state updates feed the [`IdleMonitor`] and tear rooms down when the
//!   bot is removed from voice
//! - Room events are posted back to Discord by [`events::Announcer`]

use dashmap::DashMap;
use serenity::{
    all::{ActivityData, Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;
pub mod voice;

use crate::{
    audio::{coordinator::PlaybackCoordinator, idle_monitor::IdleMonitor},
    config::Config,
};
use events::AnnounceChannels;
use voice::CacheOccupancy;

/// Serenity event handler for Guild Jukebox.
pub struct JukeboxBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    pub coordinator: Arc<PlaybackCoordinator>,
    /// Needs the serenity cache, so it is created on the first `ready`
    idle: OnceLock<IdleMonitor>,
    announce_channels: AnnounceChannels,
}

impl JukeboxBot {
    pub fn new(
        config: Arc<Config>,
        coordinator: Arc<PlaybackCoordinator>,
        announce_channels: AnnounceChannels,
    ) -> Self {
        Self {
            config,
            coordinator,
            idle: OnceLock::new(),
            announce_channels,
        }
    }

    pub fn announce_channels() -> AnnounceChannels {
        Arc::new(DashMap::new())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening(format!(
            "{}help",
            self.config.prefix
        ))));

        self.idle.get_or_init(|| {
            IdleMonitor::new(
                self.coordinator.clone(),
                Arc::new(CacheOccupancy::new(ctx.cache.clone())),
                self.config.idle_grace(),
            )
        });
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Err(e) = handlers::handle_message(&ctx, &msg, self).await {
            error!("Error manejando comando: {:?}", e);
        }
    }

    /// Handles voice state updates for users and the bot.
    ///
    /// - **Bot removed from voice**: tears the room down through `disconnect`
    /// - **Bot left alone**: schedules auto-disconnect after the grace period
    /// - **Someone joins**: cancels a pending auto-disconnect
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        // Detectar si el bot fue desconectado
        let current_user_id = ctx.cache.current_user().id;
        let was_in_voice = old.as_ref().and_then(|o| o.channel_id).is_some();
        if new.user_id == current_user_id && was_in_voice && new.channel_id.is_none() {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            if let Err(e) = self.coordinator.disconnect(guild_id).await {
                warn!("Error al limpiar la sala tras la desconexión: {}", e);
            }
        }

        let Some(idle) = self.idle.get() else {
            return;
        };
        if let Some(listeners) = voice::listeners_in_bot_channel(&ctx.cache, guild_id) {
            idle.observe(guild_id, listeners);
        }
    }
}
