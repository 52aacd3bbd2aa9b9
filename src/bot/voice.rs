use async_trait::async_trait;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId, UserId},
};
use std::sync::Arc;

use crate::audio::idle_monitor::Occupancy;

/// Canal de voz en el que está `user` dentro de `guild`, según la caché
pub fn user_voice_channel(cache: &Cache, guild: GuildId, user: UserId) -> Option<ChannelId> {
    let guild = cache.guild(guild)?;
    guild.voice_states.get(&user).and_then(|state| state.channel_id)
}

/// Oyentes humanos en el canal de voz del bot, o `None` si el bot no está en voz
pub fn listeners_in_bot_channel(cache: &Cache, guild_id: GuildId) -> Option<usize> {
    let bot_id = cache.current_user().id;
    let guild = cache.guild(guild_id)?;
    let bot_channel = guild.voice_states.get(&bot_id)?.channel_id?;

    let occupants = guild.voice_states.values().map(|state| {
        let is_bot = state
            .member
            .as_ref()
            .map(|member| member.user.bot)
            .or_else(|| guild.members.get(&state.user_id).map(|m| m.user.bot))
            .unwrap_or(false);
        (state.channel_id, is_bot)
    });

    Some(count_listeners(occupants, bot_channel))
}

fn count_listeners(
    occupants: impl Iterator<Item = (Option<ChannelId>, bool)>,
    channel: ChannelId,
) -> usize {
    occupants
        .filter(|(occupied, is_bot)| *occupied == Some(channel) && !is_bot)
        .count()
}

/// Ocupación leída de la caché de serenity
pub struct CacheOccupancy {
    cache: Arc<Cache>,
}

impl CacheOccupancy {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Occupancy for CacheOccupancy {
    async fn listeners(&self, room: GuildId) -> usize {
        listeners_in_bot_channel(&self.cache, room).unwrap_or(0)
    }
}
