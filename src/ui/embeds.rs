use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use super::format::{format_duration, truncate};
use crate::{
    audio::{events::EventKind, queue::QueueSnapshot},
    sources::TrackSource,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Máximo de canciones listadas en "Próximas canciones"
const UP_NEXT_LIMIT: usize = 10;

const TITLE_MAX_CHARS: usize = 80;

/// What the bot posts for one room event.
#[derive(Debug, Clone)]
pub enum Reply {
    Embed(CreateEmbed),
    Text(String),
}

/// Convierte un evento de sala en un mensaje para Discord
pub fn render(kind: &EventKind, prefix: &str) -> Reply {
    match kind {
        EventKind::TrackStarted(track) => Reply::Embed(create_now_playing_embed(track)),
        EventKind::TrackAdded { track, position } => {
            Reply::Embed(create_track_added_embed(track, *position))
        }
        EventKind::TrackSkipped(track) => {
            Reply::Text(format!("⏭️ Saltado: **{}**", truncate(track.title(), TITLE_MAX_CHARS)))
        }
        EventKind::QueueShown(snapshot) => Reply::Embed(create_queue_embed(snapshot, prefix)),
        EventKind::LoopToggled(true) => Reply::Text("🔁 Repetición activada".to_string()),
        EventKind::LoopToggled(false) => Reply::Text("➡️ Repetición desactivada".to_string()),
        EventKind::VolumeSet(volume) => Reply::Embed(create_volume_embed(*volume)),
        EventKind::VolumeRejected(requested) => Reply::Embed(create_error_embed(
            "Volumen inválido",
            &format!("El volumen debe estar entre 0 y 200 (recibido: {requested})"),
        )),
        EventKind::QueueCleared { removed } => Reply::Embed(create_success_embed(
            "Cola limpiada",
            &format!("Se eliminaron **{removed}** canciones de la cola"),
        )),
        EventKind::Stopped => {
            Reply::Text("⏹️ Reproducción detenida y cola limpiada".to_string())
        }
        EventKind::Disconnected => Reply::Text("👋 Desconectado del canal de voz".to_string()),
        EventKind::QueueFinished => {
            Reply::Text("📭 No hay más canciones en la cola".to_string())
        }
        EventKind::ExpansionHalted { remaining } => Reply::Text(format!(
            "🛑 Se dejaron de procesar las {remaining} canciones restantes"
        )),
        EventKind::ResolutionFailed(reason) => {
            Reply::Embed(create_error_embed("No se pudo cargar la canción", reason))
        }
        EventKind::PlaybackFailed(reason) => {
            Reply::Embed(create_error_embed("Error de reproducción", reason))
        }
        EventKind::NoVoiceChannel => {
            Reply::Text("❌ Necesitas estar en un canal de voz para usar este comando".to_string())
        }
        EventKind::NothingPlaying => {
            Reply::Text("❌ No hay nada reproduciéndose ahora mismo".to_string())
        }
    }
}

/// Campos comunes (artista, duración, miniatura, enlace) de un track
fn with_track_details(mut embed: CreateEmbed, track: &TrackSource) -> CreateEmbed {
    embed = embed
        .field("🎤 Artista", track.uploader().unwrap_or("Desconocido"), true)
        .field("⏱️ Duración", format_duration(track.duration()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed.url(track.url()).timestamp(Timestamp::now())
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &TrackSource) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", truncate(track.title(), TITLE_MAX_CHARS)))
        .color(colors::SUCCESS_GREEN);

    with_track_details(embed, track).footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &TrackSource, position: usize) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("✅ Agregada a la Cola")
        .description(format!(
            "**{}** se ha agregado a la cola de reproducción",
            truncate(track.title(), TITLE_MAX_CHARS)
        ))
        .color(colors::MUSIC_PURPLE)
        .field("📍 Posición", position.to_string(), true);

    with_track_details(embed, track).footer(CreateEmbedFooter::new(
        "🎵 Se reproducirá automáticamente cuando le toque",
    ))
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &QueueSnapshot, prefix: &str) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.is_empty() {
        return embed
            .description(format!(
                "😴 **La cola está vacía**\n\n💡 Usa `{prefix}play <canción>` para agregar música"
            ))
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let now_playing = match &snapshot.current {
        Some(current) => format!(
            "**{}** `[{}]`",
            truncate(current.title(), TITLE_MAX_CHARS),
            format_duration(current.duration())
        ),
        None => "Nada".to_string(),
    };
    let status = if snapshot.loop_enabled { "🔂" } else { "▶️" };
    let mut embed = embed.field(format!("{status} Reproduciendo"), now_playing, false);

    if !snapshot.pending.is_empty() {
        let mut up_next = String::new();
        for (i, track) in snapshot.pending.iter().take(UP_NEXT_LIMIT).enumerate() {
            up_next.push_str(&format!(
                "**{}**. {} `[{}]`\n",
                i + 1,
                truncate(track.title(), TITLE_MAX_CHARS),
                format_duration(track.duration())
            ));
        }
        if snapshot.pending.len() > UP_NEXT_LIMIT {
            up_next.push_str(&format!(
                "... y {} más",
                snapshot.pending.len() - UP_NEXT_LIMIT
            ));
        }
        embed = embed.field("⏭️ Próximas canciones", up_next, false);
    }

    // Información adicional
    let total = snapshot.pending.len() + usize::from(snapshot.current.is_some());
    let mut info = format!("**Total:** {} canciones • **Volumen:** {}%", total, snapshot.volume);
    let total_duration = snapshot.total_duration();
    if !total_duration.is_zero() {
        info.push_str(&format!(
            " • **Duración:** {}",
            format_duration(Some(total_duration))
        ));
    }

    embed
        .field("Información", info, false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de volumen con indicador visual
pub fn create_volume_embed(volume: u8) -> CreateEmbed {
    let status_emoji = match volume {
        0 => "🔈",
        1..=50 => "🔉",
        _ => "🔊",
    };

    CreateEmbed::default()
        .title(format!("{} Control de Volumen", status_emoji))
        .description(format!("**Volumen actual: {}%**", volume))
        .field("📊 Nivel", create_volume_bar(volume), false)
        .color(if volume > 100 {
            colors::WARNING_ORANGE
        } else {
            colors::INFO_BLUE
        })
        .timestamp(Timestamp::now())
}

/// Crea una barra visual de volumen (20 segmentos sobre 0-200%)
fn create_volume_bar(volume: u8) -> String {
    let segments = 20;
    let filled = (usize::from(volume) * segments / 200).min(segments);
    let empty = segments - filled;

    let bar = "█".repeat(filled) + &"▒".repeat(empty);
    format!("`[{}]`", bar)
}

/// Crea un embed de ayuda general
pub fn create_help_embed(prefix: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Guild Jukebox - Comandos")
        .color(colors::INFO_BLUE)
        .field(
            "🎵 Reproducción",
            format!(
                "• `{p}play <canción|URL>` (`{p}p`) - Reproduce o agrega a la cola\n\
                • `{p}skip` (`{p}s`) - Salta la canción actual\n\
                • `{p}stop` - Detiene y limpia la cola",
                p = prefix
            ),
            false,
        )
        .field(
            "📜 Cola",
            format!(
                "• `{p}queue` - Muestra la cola\n\
                • `{p}loop` - Activa/desactiva repetición\n\
                • `{p}clear` - Limpia la cola",
                p = prefix
            ),
            false,
        )
        .field(
            "🔊 Audio y conexión",
            format!(
                "• `{p}volume <0-200>` - Ajusta el volumen\n\
                • `{p}disconnect` (`{p}dc`) - Sale del canal de voz",
                p = prefix
            ),
            false,
        )
        .field(
            "🎵 Fuentes Soportadas",
            "• Búsquedas de texto y URLs (YouTube y lo que soporte yt-dlp)\n\
            • Spotify: canciones, playlists y álbumes",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::{sync::Arc, time::Duration};

    fn json(embed: &CreateEmbed) -> Value {
        serde_json::to_value(embed).unwrap()
    }

    fn field<'a>(embed: &'a Value, name: &str) -> Option<&'a str> {
        embed["fields"]
            .as_array()?
            .iter()
            .find(|f| f["name"] == name)
            .and_then(|f| f["value"].as_str())
    }

    fn track(title: &str, secs: u64) -> Arc<TrackSource> {
        Arc::new(
            TrackSource::new(title, "https://example.com/watch")
                .with_duration(Duration::from_secs(secs)),
        )
    }

    #[test]
    fn test_now_playing_shows_duration_and_unknown_artist() {
        let embed = json(&create_now_playing_embed(&track("Song", 185)));
        assert_eq!(embed["title"], "🎵 Reproduciendo Ahora");
        assert_eq!(field(&embed, "⏱️ Duración"), Some("3:05"));
        assert_eq!(field(&embed, "🎤 Artista"), Some("Desconocido"));
    }

    #[test]
    fn test_queue_embed_lists_up_next_with_overflow() {
        let snapshot = QueueSnapshot {
            current: Some(track("now", 60)),
            pending: (1..=12).map(|i| track(&format!("t{i}"), 60)).collect(),
            loop_enabled: true,
            volume: 80,
        };

        let embed = json(&create_queue_embed(&snapshot, "!"));

        assert_eq!(field(&embed, "🔂 Reproduciendo"), Some("**now** `[1:00]`"));
        let up_next = field(&embed, "⏭️ Próximas canciones").unwrap();
        assert!(up_next.starts_with("**1**. t1 `[1:00]`"));
        assert!(up_next.contains("**10**. t10"));
        assert!(!up_next.contains("t11"));
        assert!(up_next.ends_with("... y 2 más"));
        let info = field(&embed, "Información").unwrap();
        assert!(info.contains("13 canciones"));
        assert!(info.contains("13:00"));
    }

    #[test]
    fn test_empty_queue_mentions_prefix() {
        let snapshot = QueueSnapshot {
            current: None,
            pending: Vec::new(),
            loop_enabled: false,
            volume: 100,
        };
        let embed = json(&create_queue_embed(&snapshot, "?"));
        assert!(embed["description"].as_str().unwrap().contains("`?play <canción>`"));
    }

    #[test]
    fn test_volume_bar_scales_to_200() {
        assert_eq!(create_volume_bar(0), format!("`[{}]`", "▒".repeat(20)));
        assert_eq!(create_volume_bar(100), format!("`[{}{}]`", "█".repeat(10), "▒".repeat(10)));
        assert_eq!(create_volume_bar(200), format!("`[{}]`", "█".repeat(20)));
    }

    #[test]
    fn test_render_text_replies() {
        assert!(matches!(
            render(&EventKind::ExpansionHalted { remaining: 3 }, "!"),
            Reply::Text(text) if text.contains('3')
        ));
        assert!(matches!(render(&EventKind::Stopped, "!"), Reply::Text(_)));
        assert!(matches!(
            render(&EventKind::ResolutionFailed("nope".into()), "!"),
            Reply::Embed(_)
        ));
    }
}
