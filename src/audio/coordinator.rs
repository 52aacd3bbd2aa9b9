use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::{
    events::{EventKind, EventSink},
    player::{PlaybackCompletion, PlaybackEnded, Player},
    queue::{QueueSnapshot, RoomQueue, RoomState, SharedTrack},
};
use crate::{
    error::{MusicError, ResolutionError},
    sources::{Resolution, Resolver},
};

/// Volumen máximo permitido (porcentaje)
pub const MAX_VOLUME: u8 = 200;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub default_volume: u8,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self { default_volume: 100 }
    }
}

/// What an `enqueue` did with the request.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// The room was idle and the track started right away.
    Started(SharedTrack),
    /// Appended behind the current track; `position` is 1-based.
    Queued { track: SharedTrack, position: usize },
    /// A catalog reference was expanded item by item.
    Expanded {
        placed: usize,
        failed: usize,
        halted: bool,
    },
}

/// Activity summary for one known room.
#[derive(Debug, Clone)]
pub struct RoomActivity {
    pub room: GuildId,
    pub state: RoomState,
    pub last_activity: DateTime<Utc>,
}

/// Per-room playback state machine.
///
/// Every room has its own async mutex; all mutations of a room (intents and
/// completion handling) happen while holding it, so they never interleave.
/// Different rooms never share a lock. Resolution runs outside the lock so a
/// `stop` can land while a catalog expansion is in flight; the expansion
/// observes it before resolving the next sub-item and again before placing the
/// sub-item that was resolving, which is then discarded.
///
/// Time limits belong to the resolver: only the media extraction is bounded, so
/// paging through a long catalog is never cut short.
///
/// Rooms are created on first use and never removed, only reset.
pub struct PlaybackCoordinator {
    rooms: DashMap<GuildId, Arc<Mutex<RoomQueue>>>,
    resolver: Arc<dyn Resolver>,
    player: Arc<dyn Player>,
    events: EventSink,
    completions: mpsc::UnboundedSender<PlaybackEnded>,
    next_session: AtomicU64,
    settings: CoordinatorSettings,
}

impl PlaybackCoordinator {
    /// Crea el coordinador y lanza la tarea que procesa los fines de track
    pub fn new(
        resolver: Arc<dyn Resolver>,
        player: Arc<dyn Player>,
        events: EventSink,
        settings: CoordinatorSettings,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(Self {
            rooms: DashMap::new(),
            resolver,
            player,
            events,
            completions: tx,
            next_session: AtomicU64::new(1),
            settings,
        });

        tokio::spawn(completion_loop(Arc::downgrade(&coordinator), rx));
        coordinator
    }

    /// Resolves `request` and either starts it or appends it to the room.
    pub async fn enqueue(
        &self,
        room: GuildId,
        voice_channel: Option<ChannelId>,
        request: &str,
    ) -> Result<EnqueueOutcome, MusicError> {
        let Some(channel) = voice_channel else {
            self.events.emit(room, EventKind::NoVoiceChannel);
            return Err(MusicError::NoVoiceChannel);
        };

        let queue = self.room(room);
        {
            let mut q = queue.lock().await;
            q.set_accepting_work(true);
            if let Err(e) = self.ensure_connected(room, channel).await {
                self.events.emit(room, EventKind::PlaybackFailed(e.to_string()));
                return Err(e);
            }
        }

        match self.resolver.resolve(request).await {
            Ok(Resolution::Single(track)) => self.place(room, &queue, Arc::new(track)).await,
            Ok(Resolution::Expansion(items)) => Ok(self.expand(room, &queue, items).await),
            Err(e) => {
                self.report_resolution_failure(room, request, &e);
                Err(e.into())
            }
        }
    }

    /// Drops the current track and moves on; never re-queues it, even in loop mode.
    pub async fn skip(&self, room: GuildId) -> Result<SharedTrack, MusicError> {
        let queue = self.room(room);
        let mut q = queue.lock().await;

        let Some(skipped) = q.take_current() else {
            self.events.emit(room, EventKind::NothingPlaying);
            return Err(MusicError::NothingPlaying);
        };

        // La sesión ya está invalidada: el fin de track que provoque stop() se ignora
        self.player.stop(room).await;
        info!("⏭️ Saltado: {} en guild {}", skipped.title(), room);
        self.events.emit(room, EventKind::TrackSkipped(skipped.clone()));

        self.advance(room, &mut q).await;
        Ok(skipped)
    }

    /// Stops playback, clears the queue and halts any in-flight expansion.
    pub async fn stop(&self, room: GuildId) {
        let queue = self.room(room);
        let mut q = queue.lock().await;
        self.halt(room, &mut q).await;
        self.events.emit(room, EventKind::Stopped);
    }

    /// Like [`stop`](Self::stop), and also leaves the voice channel.
    pub async fn disconnect(&self, room: GuildId) -> Result<(), MusicError> {
        let queue = self.room(room);
        let mut q = queue.lock().await;
        self.halt(room, &mut q).await;

        let was_connected = self.player.is_connected(room).await;
        self.player.disconnect(room).await?;
        if was_connected {
            info!("👋 Guild {} desconectada y cola limpiada", room);
            self.events.emit(room, EventKind::Disconnected);
        }
        Ok(())
    }

    /// Limpia la cola pendiente; el track actual sigue sonando
    pub async fn clear(&self, room: GuildId) -> usize {
        let queue = self.room(room);
        let removed = queue.lock().await.clear();
        self.events.emit(room, EventKind::QueueCleared { removed });
        removed
    }

    pub async fn toggle_loop(&self, room: GuildId) -> bool {
        let queue = self.room(room);
        let enabled = queue.lock().await.toggle_loop();
        self.events.emit(room, EventKind::LoopToggled(enabled));
        enabled
    }

    /// Sets the room volume; applied live when a track is playing.
    pub async fn set_volume(&self, room: GuildId, percent: i64) -> Result<u8, MusicError> {
        let volume = match u8::try_from(percent) {
            Ok(v) if v <= MAX_VOLUME => v,
            _ => {
                self.events.emit(room, EventKind::VolumeRejected(percent));
                return Err(MusicError::InvalidVolume(percent));
            }
        };

        let queue = self.room(room);
        let mut q = queue.lock().await;
        q.set_volume(volume);
        if q.state() == RoomState::Playing {
            self.player.set_volume(room, volume).await;
        }
        self.events.emit(room, EventKind::VolumeSet(volume));
        Ok(volume)
    }

    /// Muestra la cola (emite `QueueShown`)
    pub async fn show_queue(&self, room: GuildId) -> QueueSnapshot {
        let snapshot = self.snapshot(room).await;
        self.events.emit(room, EventKind::QueueShown(snapshot.clone()));
        snapshot
    }

    pub async fn snapshot(&self, room: GuildId) -> QueueSnapshot {
        self.room(room).lock().await.snapshot()
    }

    pub async fn state(&self, room: GuildId) -> RoomState {
        self.room(room).lock().await.state()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Estado y última actividad de cada sala conocida
    pub async fn room_activity(&self) -> Vec<RoomActivity> {
        let rooms: Vec<(GuildId, Arc<Mutex<RoomQueue>>)> = self
            .rooms
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut activity = Vec::with_capacity(rooms.len());
        for (room, queue) in rooms {
            let q = queue.lock().await;
            activity.push(RoomActivity {
                room,
                state: q.state(),
                last_activity: q.last_activity(),
            });
        }
        activity
    }

    /// Processes the end of a stream reported by the player.
    ///
    /// Stale notifications (for a track that was skipped or stopped) are ignored.
    pub async fn handle_track_end(&self, ended: PlaybackEnded) {
        let Some(queue) = self.rooms.get(&ended.room).map(|q| q.clone()) else {
            return;
        };
        let room = ended.room;
        let mut q = queue.lock().await;

        if !q.is_current_session(ended.session) {
            debug!("Fin de track obsoleto (sesión {}) en guild {}", ended.session, room);
            return;
        }

        let finished = q.take_current();
        match ended.error {
            Some(reason) => {
                warn!("❌ Error de reproducción en guild {}: {}", room, reason);
                self.events.emit(room, EventKind::PlaybackFailed(reason));
            }
            None => {
                if let Some(track) = finished.filter(|_| q.loop_enabled()) {
                    q.requeue_front(track);
                }
            }
        }

        self.advance(room, &mut q).await;
    }

    fn room(&self, room: GuildId) -> Arc<Mutex<RoomQueue>> {
        self.rooms
            .entry(room)
            .or_insert_with(|| Arc::new(Mutex::new(RoomQueue::new(self.settings.default_volume))))
            .clone()
    }

    async fn ensure_connected(&self, room: GuildId, channel: ChannelId) -> Result<(), MusicError> {
        match self.player.current_channel(room).await {
            None => self.player.connect(room, channel).await,
            Some(current) if current != channel => self.player.move_to(room, channel).await,
            Some(_) => Ok(()),
        }
    }

    /// Resuelve y encola cada elemento del catálogo en orden
    async fn expand(
        &self,
        room: GuildId,
        queue: &Mutex<RoomQueue>,
        items: Vec<String>,
    ) -> EnqueueOutcome {
        let total = items.len();
        info!("📜 Expandiendo {} elementos en guild {}", total, room);
        let (mut placed, mut failed) = (0, 0);

        for (index, item) in items.iter().enumerate() {
            // Punto de cancelación cooperativo: no interrumpe una resolución en curso
            if !queue.lock().await.accepting_work() {
                return self.expansion_halted(room, total - index, placed, failed);
            }

            let track = match self.resolver.resolve(item).await {
                Ok(Resolution::Single(track)) => Arc::new(track),
                Ok(Resolution::Expansion(_)) => {
                    let e = ResolutionError::NestedExpansion(item.clone());
                    self.report_resolution_failure(room, item, &e);
                    failed += 1;
                    continue;
                }
                Err(e) => {
                    self.report_resolution_failure(room, item, &e);
                    failed += 1;
                    continue;
                }
            };

            // Un stop durante la resolución descarta también este elemento
            let mut q = queue.lock().await;
            if !q.accepting_work() {
                drop(q);
                return self.expansion_halted(room, total - index, placed, failed);
            }
            match self.place_locked(room, &mut q, track).await {
                Ok(_) => placed += 1,
                Err(_) => failed += 1,
            }
        }

        EnqueueOutcome::Expanded {
            placed,
            failed,
            halted: false,
        }
    }

    fn expansion_halted(
        &self,
        room: GuildId,
        remaining: usize,
        placed: usize,
        failed: usize,
    ) -> EnqueueOutcome {
        info!("❌ Expansión detenida, {} elementos descartados", remaining);
        self.events.emit(room, EventKind::ExpansionHalted { remaining });
        EnqueueOutcome::Expanded {
            placed,
            failed,
            halted: true,
        }
    }

    async fn place(
        &self,
        room: GuildId,
        queue: &Mutex<RoomQueue>,
        track: SharedTrack,
    ) -> Result<EnqueueOutcome, MusicError> {
        let mut q = queue.lock().await;
        self.place_locked(room, &mut q, track).await
    }

    /// Arranca el track si la sala está libre; si no, lo agrega a la cola
    async fn place_locked(
        &self,
        room: GuildId,
        q: &mut RoomQueue,
        track: SharedTrack,
    ) -> Result<EnqueueOutcome, MusicError> {
        if q.state() == RoomState::Idle {
            self.start_track(room, q, track.clone()).await?;
            Ok(EnqueueOutcome::Started(track))
        } else {
            let position = q.push(track.clone());
            self.events.emit(
                room,
                EventKind::TrackAdded {
                    track: track.clone(),
                    position,
                },
            );
            Ok(EnqueueOutcome::Queued { track, position })
        }
    }

    async fn start_track(
        &self,
        room: GuildId,
        q: &mut RoomQueue,
        track: SharedTrack,
    ) -> Result<(), MusicError> {
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let completion = PlaybackCompletion::new(room, session, self.completions.clone());

        match self.player.start(room, track.clone(), q.volume(), completion).await {
            Ok(()) => {
                q.set_current(track.clone(), session);
                self.events.emit(room, EventKind::TrackStarted(track));
                Ok(())
            }
            Err(e) => {
                error!("❌ No se pudo iniciar '{}': {}", track.title(), e);
                self.events.emit(room, EventKind::PlaybackFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Arranca el siguiente track pendiente que se deje iniciar, o deja la sala en Idle
    async fn advance(&self, room: GuildId, q: &mut RoomQueue) {
        while let Some(next) = q.pop_next() {
            if self.start_track(room, q, next).await.is_ok() {
                return;
            }
        }
        debug!("Guild {} sin más tracks", room);
        self.events.emit(room, EventKind::QueueFinished);
    }

    async fn halt(&self, room: GuildId, q: &mut RoomQueue) {
        q.set_accepting_work(false);
        q.clear();
        if q.take_current().is_some() {
            self.player.stop(room).await;
        }
    }

    fn report_resolution_failure(&self, room: GuildId, request: &str, err: &ResolutionError) {
        warn!("🔍 No se pudo resolver '{}': {}", request, err);
        self.events.emit(room, EventKind::ResolutionFailed(err.to_string()));
    }
}

/// Recibe los fines de track y los procesa sin bloquear otras salas
async fn completion_loop(
    coordinator: Weak<PlaybackCoordinator>,
    mut rx: mpsc::UnboundedReceiver<PlaybackEnded>,
) {
    while let Some(ended) = rx.recv().await {
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        tokio::spawn(async move { coordinator.handle_track_end(ended).await });
    }
}
