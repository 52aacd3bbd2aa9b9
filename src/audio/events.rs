use serenity::model::id::GuildId;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::queue::{QueueSnapshot, SharedTrack};

/// Something that happened in a room, for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    pub room: GuildId,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Appended to `pending`; `position` is 1-based.
    TrackAdded { track: SharedTrack, position: usize },
    TrackStarted(SharedTrack),
    TrackSkipped(SharedTrack),
    QueueShown(QueueSnapshot),
    LoopToggled(bool),
    VolumeSet(u8),
    VolumeRejected(i64),
    QueueCleared { removed: usize },
    Stopped,
    Disconnected,
    /// The room ran out of tracks and went idle.
    QueueFinished,
    /// A stop interrupted a catalog expansion before `remaining` sub-items.
    ExpansionHalted { remaining: usize },
    ResolutionFailed(String),
    PlaybackFailed(String),
    NoVoiceChannel,
    NothingPlaying,
}

/// Envía eventos hacia la capa de presentación
///
/// Sending never blocks; events for a closed receiver are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<RoomEvent>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<RoomEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, room: GuildId, kind: EventKind) {
        if self.tx.send(RoomEvent { room, kind }).is_err() {
            debug!("Sin receptor de eventos para guild {}", room);
        }
    }
}
