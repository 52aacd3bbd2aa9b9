use chrono::{DateTime, Utc};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::sources::TrackSource;

/// Track compartido entre la cola, el player y los eventos
pub type SharedTrack = Arc<TrackSource>;

/// Observable playback state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Idle,
    Playing,
}

/// Mutable state of one room.
///
/// Only touched while holding the room's lock in the coordinator. `current`
/// is never also present in `pending`.
#[derive(Debug)]
pub struct RoomQueue {
    pending: VecDeque<SharedTrack>,
    current: Option<SharedTrack>,
    loop_enabled: bool,
    volume: u8,
    accepting_work: bool,
    /// Playback session of `current`; completions for any other id are stale.
    session: Option<u64>,
    last_activity: DateTime<Utc>,
}

impl RoomQueue {
    pub fn new(volume: u8) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            loop_enabled: false,
            volume,
            accepting_work: true,
            session: None,
            last_activity: Utc::now(),
        }
    }

    pub fn state(&self) -> RoomState {
        if self.current.is_some() {
            RoomState::Playing
        } else {
            RoomState::Idle
        }
    }

    pub fn current(&self) -> Option<&SharedTrack> {
        self.current.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn accepting_work(&self) -> bool {
        self.accepting_work
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Agrega un track al final de la cola; devuelve su posición (1-based)
    pub fn push(&mut self, track: SharedTrack) -> usize {
        info!("➕ Agregado a la cola: {}", track.title());
        self.pending.push_back(track);
        self.touch();
        self.pending.len()
    }

    /// Marca `track` como el que suena ahora bajo la sesión `session`
    pub fn set_current(&mut self, track: SharedTrack, session: u64) {
        self.current = Some(track);
        self.session = Some(session);
        self.touch();
    }

    /// Whether a completion tagged with `session` belongs to the current track.
    pub fn is_current_session(&self, session: u64) -> bool {
        self.session == Some(session)
    }

    /// Retira el track actual e invalida su sesión
    pub fn take_current(&mut self) -> Option<SharedTrack> {
        self.session = None;
        self.touch();
        self.current.take()
    }

    /// Vuelve a poner un track terminado al frente de la cola (modo loop)
    pub fn requeue_front(&mut self, track: SharedTrack) {
        debug!("🔁 Repitiendo: {}", track.title());
        self.pending.push_front(track);
    }

    /// Obtiene el siguiente track (FIFO)
    pub fn pop_next(&mut self) -> Option<SharedTrack> {
        let next = self.pending.pop_front();
        match &next {
            Some(track) => info!("➡️ Siguiente en cola (FIFO): {}", track.title()),
            None => info!("📭 Cola vacía, no hay siguiente track"),
        }
        next
    }

    /// Limpia la cola; devuelve cuántos tracks se eliminaron
    pub fn clear(&mut self) -> usize {
        let removed = self.pending.len();
        self.pending.clear();
        self.touch();
        info!("🗑️ Cola limpiada ({} canciones)", removed);
        removed
    }

    /// Cambia el modo de loop
    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        if self.loop_enabled {
            info!("🔁 Repetición activada");
        } else {
            info!("➡️ Repetición desactivada");
        }
        self.loop_enabled
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
        self.touch();
    }

    pub fn set_accepting_work(&mut self, accepting: bool) {
        self.accepting_work = accepting;
    }

    /// Obtiene una foto de la cola para mostrarla
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            pending: self.pending.iter().cloned().collect(),
            loop_enabled: self.loop_enabled,
            volume: self.volume,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let current_in_pending = self
            .current
            .as_ref()
            .is_some_and(|cur| self.pending.iter().any(|p| Arc::ptr_eq(p, cur)));
        let session_matches = self.current.is_some() == self.session.is_some();
        !current_in_pending && session_matches
    }
}

/// Immutable view of a room's queue at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub current: Option<SharedTrack>,
    pub pending: Vec<SharedTrack>,
    pub loop_enabled: bool,
    pub volume: u8,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    /// Duración total conocida (actual + pendientes)
    pub fn total_duration(&self) -> Duration {
        self.current
            .iter()
            .chain(self.pending.iter())
            .filter_map(|t| t.duration())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str) -> SharedTrack {
        Arc::new(TrackSource::new(title, format!("https://example.com/{title}")))
    }

    fn titles(snapshot: &QueueSnapshot) -> Vec<&str> {
        snapshot.pending.iter().map(|t| t.title()).collect()
    }

    #[test]
    fn test_new_room_is_idle_with_defaults() {
        let queue = RoomQueue::new(100);
        assert_eq!(queue.state(), RoomState::Idle);
        assert!(!queue.loop_enabled());
        assert!(queue.accepting_work());
        assert_eq!(queue.volume(), 100);
        assert!(queue.snapshot().is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = RoomQueue::new(100);
        assert_eq!(queue.push(track("a")), 1);
        assert_eq!(queue.push(track("b")), 2);
        assert_eq!(queue.pop_next().unwrap().title(), "a");
        assert_eq!(queue.pop_next().unwrap().title(), "b");
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn test_requeue_goes_to_front() {
        let mut queue = RoomQueue::new(100);
        queue.push(track("b"));
        queue.push(track("c"));
        queue.requeue_front(track("a"));
        assert_eq!(titles(&queue.snapshot()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_take_current_invalidates_session() {
        let mut queue = RoomQueue::new(100);
        queue.set_current(track("a"), 7);
        assert!(queue.is_current_session(7));
        assert!(!queue.is_current_session(8));
        assert_eq!(queue.state(), RoomState::Playing);

        let finished = queue.take_current().unwrap();
        assert_eq!(finished.title(), "a");
        assert!(!queue.is_current_session(7));
        assert_eq!(queue.state(), RoomState::Idle);
        assert!(queue.is_consistent());
    }

    #[test]
    fn test_clear_keeps_current() {
        let mut queue = RoomQueue::new(100);
        queue.set_current(track("now"), 1);
        queue.push(track("x"));
        queue.push(track("y"));

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.current().unwrap().title(), "now");
    }

    #[test]
    fn test_toggle_loop_flips() {
        let mut queue = RoomQueue::new(100);
        assert!(queue.toggle_loop());
        assert!(!queue.toggle_loop());
    }

    #[test]
    fn test_consistency_detects_current_in_pending() {
        let mut queue = RoomQueue::new(100);
        let shared = track("dup");
        queue.set_current(shared.clone(), 1);
        assert!(queue.is_consistent());
        queue.push(shared);
        assert!(!queue.is_consistent());
    }

    #[test]
    fn test_total_duration_skips_unknown() {
        let mut queue = RoomQueue::new(100);
        queue.set_current(
            Arc::new(TrackSource::new("a", "u").with_duration(Duration::from_secs(60))),
            1,
        );
        queue.push(track("live"));
        queue.push(Arc::new(TrackSource::new("b", "u").with_duration(Duration::from_secs(30))));
        assert_eq!(queue.snapshot().total_duration(), Duration::from_secs(90));
    }
}
