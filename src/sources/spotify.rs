use parking_lot::Mutex;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::ResolutionError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Referencia a un recurso del catálogo de Spotify
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyRef {
    Track(String),
    Playlist(String),
    Album(String),
}

impl SpotifyRef {
    /// Interpreta una URL de open.spotify.com / play.spotify.com
    ///
    /// Returns `Ok(None)` for non-Spotify input and `Err` for Spotify URLs that
    /// do not name a track, playlist or album.
    pub fn parse(input: &str) -> Result<Option<Self>, ResolutionError> {
        let Ok(parsed) = url::Url::parse(input.trim()) else {
            return Ok(None);
        };
        if !matches!(parsed.host_str(), Some("open.spotify.com" | "play.spotify.com")) {
            return Ok(None);
        }

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        // Saltar prefijos de idioma como /intl-es/
        let mut iter = segments.iter().skip_while(|seg| seg.starts_with("intl-"));
        let kind = iter.next().copied();
        let id = iter.next().map(|s| s.to_string());

        match (kind, id) {
            (Some("track"), Some(id)) => Ok(Some(Self::Track(id))),
            (Some("playlist"), Some(id)) => Ok(Some(Self::Playlist(id))),
            (Some("album"), Some(id)) => Ok(Some(Self::Album(id))),
            _ => Err(ResolutionError::InvalidReference(
                "URL de Spotify inválida: usa una pista, playlist o álbum".to_string(),
            )),
        }
    }
}

/// Cliente del API web de Spotify (client credentials)
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<(String, Instant)>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Track {
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

impl Track {
    /// Término de búsqueda "título artista"
    fn search_query(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} {}", self.name, artist.name),
            None => self.name.clone(),
        }
    }
}

impl SpotifyClient {
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            token: Mutex::new(None),
        }
    }

    /// Obtiene el término de búsqueda para una pista
    pub async fn track_query(&self, id: &str) -> Result<String, ResolutionError> {
        let track: Track = self.get_json(&format!("{API_BASE}/tracks/{id}")).await?;
        Ok(track.search_query())
    }

    /// Obtiene todas las pistas de una playlist, recorriendo todas las páginas
    pub async fn playlist_queries(&self, id: &str) -> Result<Vec<String>, ResolutionError> {
        let first = format!("{API_BASE}/playlists/{id}/tracks?limit=100");
        let items: Vec<PlaylistItem> = self.collect_pages(first).await?;
        // Los episodios o pistas eliminadas llegan como track: null
        let queries: Vec<String> = items
            .into_iter()
            .filter_map(|item| item.track.map(|t| t.search_query()))
            .collect();
        info!("📜 Playlist de Spotify con {} pistas", queries.len());
        Ok(queries)
    }

    /// Obtiene todas las pistas de un álbum, recorriendo todas las páginas
    pub async fn album_queries(&self, id: &str) -> Result<Vec<String>, ResolutionError> {
        let first = format!("{API_BASE}/albums/{id}/tracks?limit=50");
        let tracks: Vec<Track> = self.collect_pages(first).await?;
        info!("💿 Álbum de Spotify con {} pistas", tracks.len());
        Ok(tracks.iter().map(Track::search_query).collect())
    }

    async fn collect_pages<T>(&self, first: String) -> Result<Vec<T>, ResolutionError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            debug!("📄 Página de Spotify con {} elementos", page.items.len());
            items.extend(page.items);
            next = page.next;
        }

        Ok(items)
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, ResolutionError>
    where
        T: serde::de::DeserializeOwned,
    {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn access_token(&self) -> Result<String, ResolutionError> {
        if let Some((token, expires_at)) = self.token.lock().as_ref() {
            if Instant::now() < *expires_at {
                return Ok(token.clone());
            }
        }

        debug!("🔑 Solicitando token de Spotify");
        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Renovar un poco antes de que expire
        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(30));
        *self.token.lock() = Some((response.access_token.clone(), Instant::now() + lifetime));
        Ok(response.access_token)
    }
}
