use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::ControlError,
    input::{HttpRequest, Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::{audio::queue::SharedTrack, error::MusicError};

/// Notification that the stream started under `session` has ended.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEnded {
    pub room: GuildId,
    pub session: u64,
    /// `Some` when the stream ended because of a playback failure.
    pub error: Option<String>,
}

/// One-shot handle a [`Player`] uses to report the end of a stream.
///
/// Cheap to clone so several voice event handlers can share it; only the
/// first call to [`PlaybackCompletion::finish`] is delivered.
#[derive(Debug, Clone)]
pub struct PlaybackCompletion {
    room: GuildId,
    session: u64,
    tx: Arc<Mutex<Option<UnboundedSender<PlaybackEnded>>>>,
}

impl PlaybackCompletion {
    pub fn new(room: GuildId, session: u64, tx: UnboundedSender<PlaybackEnded>) -> Self {
        Self {
            room,
            session,
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Reporta el fin del stream; devuelve `false` si ya se había reportado
    pub fn finish(&self, error: Option<String>) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            return false;
        };
        let ended = PlaybackEnded {
            room: self.room,
            session: self.session,
            error,
        };
        if tx.send(ended).is_err() {
            debug!("Coordinador cerrado, fin de track descartado");
        }
        true
    }
}

/// Audio sink collaborator: one voice connection and at most one stream per room.
#[async_trait]
pub trait Player: Send + Sync {
    async fn connect(&self, room: GuildId, channel: ChannelId) -> Result<(), MusicError>;

    async fn move_to(&self, room: GuildId, channel: ChannelId) -> Result<(), MusicError>;

    /// Canal de voz al que está conectado el bot en `room`, si lo hay
    async fn current_channel(&self, room: GuildId) -> Option<ChannelId>;

    async fn is_connected(&self, room: GuildId) -> bool {
        self.current_channel(room).await.is_some()
    }

    /// Begins streaming `track`; `on_end` must be finished when the stream ends.
    async fn start(
        &self,
        room: GuildId,
        track: SharedTrack,
        volume: u8,
        on_end: PlaybackCompletion,
    ) -> Result<(), MusicError>;

    /// Detiene el stream actual
    async fn stop(&self, room: GuildId);

    async fn set_volume(&self, room: GuildId, volume: u8);

    async fn is_playing(&self, room: GuildId) -> bool;

    async fn disconnect(&self, room: GuildId) -> Result<(), MusicError>;
}

/// Player sobre Songbird
pub struct SongbirdPlayer {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    current_tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdPlayer {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self {
            manager,
            http,
            current_tracks: DashMap::new(),
        }
    }

    async fn join(&self, room: GuildId, channel: ChannelId) -> Result<(), MusicError> {
        self.manager.join(room, channel).await.map_err(|e| {
            error!("Error al conectar al canal de voz: {:?}", e);
            MusicError::Voice(e.to_string())
        })?;
        Ok(())
    }

    fn input_for(&self, track: &SharedTrack) -> Input {
        match track.stream_url() {
            Some(stream_url) => HttpRequest::new(self.http.clone(), stream_url.to_string()).into(),
            None => YoutubeDl::new(self.http.clone(), track.url().to_string()).into(),
        }
    }
}

#[async_trait]
impl Player for SongbirdPlayer {
    async fn connect(&self, room: GuildId, channel: ChannelId) -> Result<(), MusicError> {
        self.join(room, channel).await?;
        info!("🔊 Conectado al canal de voz {} en guild {}", channel, room);
        Ok(())
    }

    async fn move_to(&self, room: GuildId, channel: ChannelId) -> Result<(), MusicError> {
        // join sobre una llamada existente mueve al bot de canal
        self.join(room, channel).await?;
        info!("🔀 Movido al canal de voz {} en guild {}", channel, room);
        Ok(())
    }

    async fn current_channel(&self, room: GuildId) -> Option<ChannelId> {
        let call = self.manager.get(room)?;
        let handler = call.lock().await;
        handler.current_channel().map(|c| ChannelId::from(c.0))
    }

    async fn start(
        &self,
        room: GuildId,
        track: SharedTrack,
        volume: u8,
        on_end: PlaybackCompletion,
    ) -> Result<(), MusicError> {
        let call = self
            .manager
            .get(room)
            .ok_or_else(|| MusicError::Playback("no hay conexión de voz".to_string()))?;

        info!("🎵 Reproduciendo: {}", track.title());
        let input = self.input_for(&track);
        let handle = call.lock().await.play_input(input);

        if let Err(e) = handle.set_volume(f32::from(volume) / 100.0) {
            warn!("No se pudo ajustar el volumen inicial: {:?}", e);
        }

        arm_stream(&handle, &on_end)?;

        // Guardar referencia al track actual
        self.current_tracks.insert(room, handle);
        Ok(())
    }

    async fn stop(&self, room: GuildId) {
        if let Some((_, track)) = self.current_tracks.remove(&room) {
            let _ = track.stop();
            info!("⏹️ Reproducción detenida en guild {}", room);
        }
    }

    async fn set_volume(&self, room: GuildId, volume: u8) {
        if let Some(track) = self.current_tracks.get(&room) {
            let _ = track.set_volume(f32::from(volume) / 100.0);
            info!("🔊 Volumen ajustado a {}%", volume);
        }
    }

    async fn is_playing(&self, room: GuildId) -> bool {
        let Some(track) = self.current_tracks.get(&room).map(|t| t.clone()) else {
            return false;
        };
        match track.get_info().await {
            Ok(info) => info.playing == PlayMode::Play,
            Err(_) => false,
        }
    }

    async fn disconnect(&self, room: GuildId) -> Result<(), MusicError> {
        self.current_tracks.remove(&room);
        if self.manager.get(room).is_none() {
            return Ok(());
        }
        self.manager
            .remove(room)
            .await
            .map_err(|e| MusicError::Voice(e.to_string()))?;
        info!("👋 Desconectado del canal de voz en guild {}", room);
        Ok(())
    }
}

/// Lo que `start` necesita del handle de un stream ya arrancado
trait StreamControl {
    fn watch_end(&self, completion: &PlaybackCompletion) -> Result<(), ControlError>;

    fn halt(&self);
}

impl StreamControl for TrackHandle {
    fn watch_end(&self, completion: &PlaybackCompletion) -> Result<(), ControlError> {
        for event in [TrackEvent::End, TrackEvent::Error] {
            self.add_event(
                Event::Track(event),
                TrackEndNotifier {
                    completion: completion.clone(),
                },
            )?;
        }
        Ok(())
    }

    fn halt(&self) {
        let _ = self.stop();
    }
}

/// Registra el aviso de fin; si no se puede, detiene el stream para no dejarlo huérfano
fn arm_stream(
    stream: &impl StreamControl,
    completion: &PlaybackCompletion,
) -> Result<(), MusicError> {
    stream.watch_end(completion).map_err(|e| {
        stream.halt();
        MusicError::Playback(format!("error al registrar eventos: {e}"))
    })
}

/// Handler para cuando termina (o falla) un track
struct TrackEndNotifier {
    completion: PlaybackCompletion,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut error = None;
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(e) = &state.playing {
                    error!("❌ Error en track: {:?}", e);
                    error = Some(format!("{e:?}"));
                }
            }
        }

        if self.completion.finish(error) {
            debug!("Track terminado (sesión {})", self.completion.session());
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_completion_delivers_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let room = GuildId::new(1);
        let completion = PlaybackCompletion::new(room, 42, tx);
        let twin = completion.clone();

        assert!(completion.finish(Some("boom".to_string())));
        assert!(!twin.finish(None));

        assert_eq!(
            rx.try_recv().unwrap(),
            PlaybackEnded {
                room,
                session: 42,
                error: Some("boom".to_string()),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[derive(Default)]
    struct FakeStream {
        refuse: bool,
        halted: std::cell::Cell<bool>,
    }

    impl StreamControl for FakeStream {
        fn watch_end(&self, _completion: &PlaybackCompletion) -> Result<(), ControlError> {
            if self.refuse {
                Err(ControlError::Finished)
            } else {
                Ok(())
            }
        }

        fn halt(&self) {
            self.halted.set(true);
        }
    }

    #[test]
    fn test_unwatchable_stream_is_stopped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let completion = PlaybackCompletion::new(GuildId::new(1), 7, tx);
        let stream = FakeStream {
            refuse: true,
            ..FakeStream::default()
        };

        assert!(matches!(
            arm_stream(&stream, &completion),
            Err(MusicError::Playback(_))
        ));
        assert!(stream.halted.get());
    }

    #[test]
    fn test_watched_stream_keeps_playing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let completion = PlaybackCompletion::new(GuildId::new(1), 8, tx);
        let stream = FakeStream::default();

        assert!(arm_stream(&stream, &completion).is_ok());
        assert!(!stream.halted.get());
    }

    #[test]
    fn test_completion_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let completion = PlaybackCompletion::new(GuildId::new(1), 1, tx);
        assert!(completion.finish(None));
    }
}
