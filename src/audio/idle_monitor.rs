use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::coordinator::PlaybackCoordinator;

/// Cuenta los oyentes humanos del canal de voz del bot
#[async_trait]
pub trait Occupancy: Send + Sync {
    /// Non-bot members in the voice channel the bot occupies in `room`.
    async fn listeners(&self, room: GuildId) -> usize;
}

struct PendingTeardown {
    id: u64,
    cancel: oneshot::Sender<()>,
}

/// Disconnects rooms whose voice channel stays empty for a grace period.
///
/// At most one timer is outstanding per room. Occupancy is checked again
/// when the timer fires, so a listener who came back without producing an
/// event still keeps the bot connected.
pub struct IdleMonitor {
    grace: Duration,
    coordinator: Arc<PlaybackCoordinator>,
    occupancy: Arc<dyn Occupancy>,
    pending: Arc<DashMap<GuildId, PendingTeardown>>,
    next_id: AtomicU64,
}

impl IdleMonitor {
    pub fn new(
        coordinator: Arc<PlaybackCoordinator>,
        occupancy: Arc<dyn Occupancy>,
        grace: Duration,
    ) -> Self {
        Self {
            grace,
            coordinator,
            occupancy,
            pending: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registra un cambio de ocupación del canal del bot en `room`
    pub fn observe(&self, room: GuildId, listeners: usize) {
        if listeners > 0 {
            if let Some((_, timer)) = self.pending.remove(&room) {
                let _ = timer.cancel.send(());
                debug!("👥 Alguien volvió a guild {}, desconexión cancelada", room);
            }
            return;
        }

        match self.pending.entry(room) {
            Entry::Occupied(_) => debug!("Ya hay un temporizador de inactividad en guild {}", room),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (cancel, cancelled) = oneshot::channel();
                slot.insert(PendingTeardown { id, cancel });

                debug!("⏳ Canal vacío en guild {}, esperando {:?}", room, self.grace);
                tokio::spawn(grace_timer(
                    room,
                    id,
                    self.grace,
                    cancelled,
                    self.coordinator.clone(),
                    self.occupancy.clone(),
                    self.pending.clone(),
                ));
            }
        }
    }

    pub fn has_pending(&self, room: GuildId) -> bool {
        self.pending.contains_key(&room)
    }
}

async fn grace_timer(
    room: GuildId,
    id: u64,
    grace: Duration,
    cancelled: oneshot::Receiver<()>,
    coordinator: Arc<PlaybackCoordinator>,
    occupancy: Arc<dyn Occupancy>,
    pending: Arc<DashMap<GuildId, PendingTeardown>>,
) {
    tokio::select! {
        _ = tokio::time::sleep(grace) => {}
        _ = cancelled => return,
    }

    pending.remove_if(&room, |_, timer| timer.id == id);

    let listeners = occupancy.listeners(room).await;
    if listeners > 0 {
        debug!("Guild {} tiene {} oyentes al expirar, se mantiene", room, listeners);
        return;
    }

    info!("💤 Canal vacío en guild {}, desconectando", room);
    if let Err(e) = coordinator.disconnect(room).await {
        warn!("Error al desconectar por inactividad: {}", e);
    }
}
