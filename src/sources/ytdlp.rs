use async_trait::async_trait;
use serde::Deserialize;
use std::{future::Future, time::Duration};
use tracing::{debug, error, info, warn};

use super::{is_url, Resolution, Resolver, TrackSource};
use crate::error::ResolutionError;

/// Cliente que extrae metadatos y URL de stream usando yt-dlp
///
/// Each call spawns one `yt-dlp` child process bounded by `timeout`. The child
/// is killed when the future is dropped, so hitting the bound aborts the
/// extraction itself instead of leaving it running in the background.
pub struct YtDlpClient {
    binary: String,
    timeout: Duration,
}

impl YtDlpClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn verify_dependencies(&self) -> anyhow::Result<()> {
        let output = async_process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ yt-dlp versión: {}", version.trim());
                Ok(())
            }
            _ => {
                error!("❌ yt-dlp no encontrado. Instala con: pip install yt-dlp");
                anyhow::bail!("yt-dlp no disponible")
            }
        }
    }

    /// Extrae la información del primer resultado para una URL o búsqueda
    pub async fn extract(&self, query: &str) -> Result<TrackSource, ResolutionError> {
        within(self.timeout, query, self.run(query)).await
    }

    async fn run(&self, query: &str) -> Result<TrackSource, ResolutionError> {
        let mut cmd = async_process::Command::new(&self.binary);
        cmd.args([
            "--dump-single-json",
            "--no-playlist",
            "--default-search",
            "ytsearch",
            "--format",
            "bestaudio/best",
            "--quiet",
            "--no-warnings",
        ]);

        if let Some(cookies) = find_cookies_file().await {
            cmd.arg("--cookies").arg(cookies);
        }

        let output = cmd
            .arg("--")
            .arg(query)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolutionError::Extractor(format!("no se pudo ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló para '{}': {}", query, stderr.trim());
            return Err(classify_failure(query, &stderr));
        }

        parse_info(query, &output.stdout)
    }
}

#[async_trait]
impl Resolver for YtDlpClient {
    async fn resolve(&self, request: &str) -> Result<Resolution, ResolutionError> {
        if is_url(request) {
            debug!("🔗 URL directa con yt-dlp: {}", request);
        } else {
            debug!("🔍 Buscando con yt-dlp: {}", request);
        }
        self.extract(request).await.map(Resolution::Single)
    }
}

/// Limita una extracción; al vencer se descarta el futuro (y con él el proceso)
async fn within<T>(
    limit: Duration,
    query: &str,
    extraction: impl Future<Output = Result<T, ResolutionError>>,
) -> Result<T, ResolutionError> {
    match tokio::time::timeout(limit, extraction).await {
        Ok(result) => result,
        Err(_) => {
            warn!("⏰ Timeout extrayendo '{}'", query);
            Err(ResolutionError::Timeout(limit))
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    entries: Option<Vec<VideoInfo>>,
}

/// Convierte la salida JSON de yt-dlp en un TrackSource
///
/// Search results and playlists carry `entries`; only the first one is used.
fn parse_info(query: &str, stdout: &[u8]) -> Result<TrackSource, ResolutionError> {
    let mut info: VideoInfo = serde_json::from_slice(stdout)
        .map_err(|e| ResolutionError::Extractor(format!("JSON inválido de yt-dlp: {e}")))?;

    if let Some(entries) = info.entries.take() {
        info = entries
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NotFound(query.to_string()))?;
    }

    let page_url = info
        .webpage_url
        .or_else(|| info.url.clone())
        .ok_or_else(|| ResolutionError::NotFound(query.to_string()))?;

    let mut track = TrackSource::new(info.title.unwrap_or_else(|| "Unknown".to_string()), page_url);
    if let Some(uploader) = info.uploader {
        track = track.with_uploader(uploader);
    }
    if let Some(secs) = info.duration.filter(|d| d.is_finite() && *d >= 0.0) {
        track = track.with_duration(Duration::from_secs_f64(secs));
    }
    if let Some(thumbnail) = info.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }
    if let Some(stream_url) = info.url {
        track = track.with_stream_url(stream_url);
    }

    Ok(track)
}

fn classify_failure(query: &str, stderr: &str) -> ResolutionError {
    let lower = stderr.to_lowercase();
    if lower.contains("unsupported url") || lower.contains("is not a valid url") {
        ResolutionError::InvalidReference(query.to_string())
    } else if lower.contains("video unavailable") || lower.contains("not found") {
        ResolutionError::NotFound(query.to_string())
    } else if lower.contains("unable to download") || lower.contains("timed out") {
        ResolutionError::Network(stderr.trim().to_string())
    } else {
        ResolutionError::Extractor(stderr.trim().to_string())
    }
}

/// Busca archivo de cookies disponible
async fn find_cookies_file() -> Option<String> {
    let cookies_paths = [
        format!("{}/.config/yt-dlp/cookies.txt", std::env::var("HOME").unwrap_or_default()),
        "./cookies.txt".to_string(),
    ];

    for path in cookies_paths {
        if tokio::fs::metadata(&path).await.is_ok() {
            debug!("🍪 Cookies encontradas en: {}", path);
            return Some(path);
        }
    }

    None
}
