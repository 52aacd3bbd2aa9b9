use anyhow::Result;
use serenity::{model::channel::Message, prelude::Context};
use tracing::{debug, info, warn};

use super::{
    commands::{parse_command, Command},
    events::send_reply,
    voice::user_voice_channel,
    JukeboxBot,
};
use crate::{
    audio::coordinator::EnqueueOutcome,
    ui::embeds::{self, Reply},
};

/// Maneja un mensaje de texto que puede ser un comando
pub async fn handle_message(ctx: &Context, msg: &Message, bot: &JukeboxBot) -> Result<()> {
    if msg.author.bot {
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let Some(command) = parse_command(&msg.content, &bot.config.prefix) else {
        return Ok(());
    };

    info!(
        "📝 Comando {:?} usado por {} en guild {}",
        command, msg.author.name, guild_id
    );

    // Los eventos de esta sala se publican donde se usó el último comando
    bot.announce_channels.insert(guild_id, msg.channel_id);
    let coordinator = &bot.coordinator;

    match command {
        Command::Play(query) => {
            let voice_channel = user_voice_channel(&ctx.cache, guild_id, msg.author.id);
            if let Err(e) = msg.channel_id.broadcast_typing(&ctx.http).await {
                debug!("No se pudo mostrar 'escribiendo': {:?}", e);
            }

            match coordinator.enqueue(guild_id, voice_channel, &query).await {
                Ok(EnqueueOutcome::Expanded {
                    placed,
                    failed,
                    halted,
                }) => {
                    let mut summary = format!("📜 Se agregaron **{placed}** canciones");
                    if failed > 0 {
                        summary.push_str(&format!(" ({failed} no se pudieron cargar)"));
                    }
                    if halted {
                        summary.push_str(" • carga interrumpida");
                    }
                    send_reply(&ctx.http, msg.channel_id, Reply::Text(summary)).await?;
                }
                Ok(_) => {}
                // Ya se notificó mediante un evento
                Err(e) => debug!("play falló en guild {}: {}", guild_id, e),
            }
        }
        Command::Queue => {
            coordinator.show_queue(guild_id).await;
        }
        Command::Loop => {
            coordinator.toggle_loop(guild_id).await;
        }
        Command::Volume(percent) => {
            if let Err(e) = coordinator.set_volume(guild_id, percent).await {
                debug!("volume rechazado: {}", e);
            }
        }
        Command::Clear => {
            coordinator.clear(guild_id).await;
        }
        Command::Stop => coordinator.stop(guild_id).await,
        Command::Disconnect => {
            if let Err(e) = coordinator.disconnect(guild_id).await {
                warn!("Error al desconectar guild {}: {}", guild_id, e);
            }
        }
        Command::Skip => {
            if let Err(e) = coordinator.skip(guild_id).await {
                debug!("skip sin efecto: {}", e);
            }
        }
        Command::Help => {
            let help = embeds::create_help_embed(&bot.config.prefix);
            send_reply(&ctx.http, msg.channel_id, Reply::Embed(help)).await?;
        }
        Command::Usage(usage) => {
            let text = format!("ℹ️ Uso: `{}{}`", bot.config.prefix, usage);
            send_reply(&ctx.http, msg.channel_id, Reply::Text(text)).await?;
        }
    }

    Ok(())
}
