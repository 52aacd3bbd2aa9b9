use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    spotify::{SpotifyClient, SpotifyRef},
    Resolution, Resolver, YtDlpClient,
};
use crate::error::ResolutionError;

/// Enruta cada petición a la fuente adecuada
///
/// - Spotify track → búsqueda "título artista" en yt-dlp → `Single`
/// - Spotify playlist/álbum → `Expansion` con una búsqueda por pista
/// - cualquier otra cosa → yt-dlp (URL directa o búsqueda)
pub struct SmartSource {
    ytdlp: Arc<YtDlpClient>,
    spotify: Option<Arc<SpotifyClient>>,
}

impl SmartSource {
    pub fn new(ytdlp: Arc<YtDlpClient>, spotify: Option<Arc<SpotifyClient>>) -> Self {
        Self { ytdlp, spotify }
    }

    fn spotify(&self) -> Result<&SpotifyClient, ResolutionError> {
        self.spotify.as_deref().ok_or_else(|| {
            ResolutionError::InvalidReference("Spotify no está configurado en este bot".to_string())
        })
    }
}

#[async_trait]
impl Resolver for SmartSource {
    async fn resolve(&self, request: &str) -> Result<Resolution, ResolutionError> {
        let Some(reference) = SpotifyRef::parse(request)? else {
            return self.ytdlp.resolve(request).await;
        };

        debug!("🟢 Referencia de Spotify: {:?}", reference);
        match reference {
            SpotifyRef::Track(id) => {
                let query = self.spotify()?.track_query(&id).await?;
                info!("🔎 Spotify track → búsqueda: {}", query);
                self.ytdlp.extract(&query).await.map(Resolution::Single)
            }
            SpotifyRef::Playlist(id) => self
                .spotify()?
                .playlist_queries(&id)
                .await
                .map(Resolution::Expansion),
            SpotifyRef::Album(id) => self
                .spotify()?
                .album_queries(&id)
                .await
                .map(Resolution::Expansion),
        }
    }
}
