use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::{
    audio::events::RoomEvent,
    ui::embeds::{self, Reply},
};

/// Canal de texto donde cada guild usó su último comando
pub type AnnounceChannels = Arc<DashMap<GuildId, ChannelId>>;

/// Publica los eventos de cada sala en su canal de texto
pub struct Announcer {
    http: Arc<Http>,
    channels: AnnounceChannels,
    prefix: String,
}

impl Announcer {
    pub fn new(http: Arc<Http>, channels: AnnounceChannels, prefix: String) -> Self {
        Self {
            http,
            channels,
            prefix,
        }
    }

    /// Consume eventos hasta que el coordinador se cierre
    pub async fn run(self, mut events: UnboundedReceiver<RoomEvent>) {
        while let Some(event) = events.recv().await {
            let Some(channel) = self.channels.get(&event.room).map(|c| *c) else {
                debug!("Sin canal de texto para guild {}, evento descartado", event.room);
                continue;
            };

            if let Err(e) = self.announce(channel, &event).await {
                warn!("Error al enviar mensaje a {}: {:?}", channel, e);
            }
        }
        debug!("Canal de eventos cerrado");
    }

    async fn announce(&self, channel: ChannelId, event: &RoomEvent) -> Result<()> {
        send_reply(&self.http, channel, embeds::render(&event.kind, &self.prefix)).await
    }
}

/// Envía una respuesta (embed o texto) a un canal
pub async fn send_reply(http: &Http, channel: ChannelId, reply: Reply) -> Result<()> {
    let message = match reply {
        Reply::Embed(embed) => CreateMessage::new().embed(embed),
        Reply::Text(text) => CreateMessage::new().content(text),
    };
    channel.send_message(http, message).await?;
    Ok(())
}
