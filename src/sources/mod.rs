pub mod smart_source;
pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ResolutionError;

pub use smart_source::SmartSource;
pub use spotify::SpotifyClient;
pub use ytdlp::YtDlpClient;

/// Outcome of resolving one request string.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A directly playable reference, or a search term's first result.
    Single(TrackSource),
    /// A catalog reference; each sub-request is resolved on its own, in order.
    Expansion(Vec<String>),
}

/// Trait común para todo lo que convierte una petición en algo reproducible
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resuelve una petición. Stateless: sólo hace I/O de red.
    async fn resolve(&self, request: &str) -> Result<Resolution, ResolutionError>;
}

/// Representa un track resuelto y listo para transmitir
///
/// Immutable once built; queues share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSource {
    title: String,
    uploader: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    url: String,
    stream_url: Option<String>,
}

impl TrackSource {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uploader: None,
            duration: None,
            thumbnail: None,
            url: url.into(),
            stream_url: None,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn uploader(&self) -> Option<&str> {
        self.uploader.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }

    // Setters
    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_stream_url(mut self, stream_url: impl Into<String>) -> Self {
        self.stream_url = Some(stream_url.into());
        self
    }
}

/// Verifica si la petición parece una URL y no un término de búsqueda
pub fn is_url(request: &str) -> bool {
    url::Url::parse(request.trim())
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_url("  http://example.com/song.mp3 "));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ftp://example.com/song.mp3"));
    }

    #[test]
    fn test_builder_keeps_metadata() {
        let track = TrackSource::new("Song", "https://example.com/watch")
            .with_uploader("Band")
            .with_duration(Duration::from_secs(215))
            .with_thumbnail("https://example.com/t.jpg");

        assert_eq!(track.title(), "Song");
        assert_eq!(track.uploader(), Some("Band"));
        assert_eq!(track.duration(), Some(Duration::from_secs(215)));
        assert_eq!(track.thumbnail(), Some("https://example.com/t.jpg"));
        assert_eq!(track.stream_url(), None);
    }
}
