use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to the caller of a room intent.
///
/// None of these are fatal to a room: every path that produces one leaves the
/// room either `Idle` or validly `Playing`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MusicError {
    /// The requester is not in a voice channel.
    #[error("necesitas estar en un canal de voz")]
    NoVoiceChannel,

    /// The intent needs an active track and the room is idle.
    #[error("no hay nada reproduciéndose")]
    NothingPlaying,

    #[error("el volumen debe estar entre 0 y 200, recibido {0}")]
    InvalidVolume(i64),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The audio sink failed to start or lost the stream mid-way.
    #[error("error de reproducción: {0}")]
    Playback(String),

    /// Joining or moving the voice connection failed.
    #[error("error de conexión de voz: {0}")]
    Voice(String),
}

/// Failure to turn a request string into something playable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("sin resultados para '{0}'")]
    NotFound(String),

    #[error("referencia inválida: {0}")]
    InvalidReference(String),

    #[error("error de red: {0}")]
    Network(String),

    #[error("tiempo de espera agotado tras {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("error del extractor: {0}")]
    Extractor(String),

    /// A catalog sub-item expanded again instead of yielding one track.
    #[error("'{0}' no es una pista individual")]
    NestedExpansion(String),
}

impl From<reqwest::Error> for ResolutionError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            ResolutionError::NotFound(err.url().map(|u| u.to_string()).unwrap_or_default())
        } else if err.is_timeout() {
            ResolutionError::Network(format!("timeout HTTP: {err}"))
        } else {
            ResolutionError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_uses_seconds() {
        let err = ResolutionError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "tiempo de espera agotado tras 10s");
    }

    #[test]
    fn test_resolution_error_is_transparent() {
        let err: MusicError = ResolutionError::NotFound("foo".into()).into();
        assert_eq!(err.to_string(), "sin resultados para 'foo'");
    }
}
