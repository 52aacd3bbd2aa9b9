use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::coordinator::{CoordinatorSettings, MAX_VOLUME};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub prefix: String,

    // Spotify (opcional: sin credenciales no se expanden playlists)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Audio
    pub default_volume: u8,
    pub ytdlp_path: String,

    // Tiempos (en segundos)
    pub resolve_timeout_secs: u64,
    pub idle_grace_secs: u64,
    pub maintenance_interval_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Builds the configuration from any key/value source; unset keys use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            prefix: var("DISCORD_PREFIX").unwrap_or(defaults.prefix),

            spotify_client_id: var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: var("SPOTIFY_CLIENT_SECRET"),

            default_volume: parse_or(var("DEFAULT_VOLUME"), "DEFAULT_VOLUME", defaults.default_volume)?,
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),

            resolve_timeout_secs: parse_or(
                var("RESOLVE_TIMEOUT_SECS"),
                "RESOLVE_TIMEOUT_SECS",
                defaults.resolve_timeout_secs,
            )?,
            idle_grace_secs: parse_or(var("IDLE_GRACE_SECS"), "IDLE_GRACE_SECS", defaults.idle_grace_secs)?,
            maintenance_interval_secs: parse_or(
                var("MAINTENANCE_INTERVAL_SECS"),
                "MAINTENANCE_INTERVAL_SECS",
                defaults.maintenance_interval_secs,
            )?,
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0 and 200
    /// - Timeouts must be greater than zero
    /// - Spotify credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > MAX_VOLUME {
            anyhow::bail!(
                "Default volume must be between 0 and {}, got: {}",
                MAX_VOLUME,
                self.default_volume
            );
        }

        if self.prefix.is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.idle_grace_secs == 0 {
            anyhow::bail!("Idle grace period must be greater than 0");
        }

        if self.maintenance_interval_secs == 0 {
            anyhow::bail!("Maintenance interval must be greater than 0");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    pub fn spotify_credentials(&self) -> Option<(&str, &str)> {
        self.spotify_client_id
            .as_deref()
            .zip(self.spotify_client_secret.as_deref())
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            default_volume: self.default_volume,
        }
    }

    /// Límite de cada extracción de yt-dlp
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.idle_grace_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token and Spotify secret.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix '{}'\n  \
            Audio: {}% vol, yt-dlp at {}\n  \
            Spotify: {}\n  \
            Timers: resolve {}, idle grace {}, maintenance every {}",
            self.prefix,
            self.default_volume,
            self.ytdlp_path,
            if self.spotify_credentials().is_some() { "enabled" } else { "disabled" },
            humantime::format_duration(self.resolve_timeout()),
            humantime::format_duration(self.idle_grace()),
            humantime::format_duration(self.maintenance_interval()),
        )
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{key} tiene un valor inválido: '{value}'")),
        None => Ok(default),
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - token must be provided)
            discord_token: String::new(),
            prefix: "!".to_string(),

            spotify_client_id: None,
            spotify_client_secret: None,

            default_volume: 100,
            ytdlp_path: "yt-dlp".to_string(),

            resolve_timeout_secs: 10,
            idle_grace_secs: 5,
            maintenance_interval_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();

        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.prefix, "!");
        assert_eq!(config.default_volume, 100);
        assert_eq!(config.idle_grace(), Duration::from_secs(5));
        assert_eq!(config.resolve_timeout(), Duration::from_secs(10));
        assert!(config.spotify_credentials().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_token_is_an_error() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("DISCORD_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("DISCORD_PREFIX", "?"),
            ("DEFAULT_VOLUME", "80"),
            ("IDLE_GRACE_SECS", "30"),
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.prefix, "?");
        assert_eq!(config.default_volume, 80);
        assert_eq!(config.idle_grace(), Duration::from_secs(30));
        assert_eq!(config.spotify_credentials(), Some(("id", "secret")));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let unparsable = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("DEFAULT_VOLUME", "loud"),
        ]));
        assert!(unparsable.is_err());

        let too_loud = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("DEFAULT_VOLUME", "201"),
        ]))
        .unwrap();
        assert!(too_loud.validate().is_err());

        let no_grace = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("IDLE_GRACE_SECS", "0"),
        ]))
        .unwrap();
        assert!(no_grace.validate().is_err());

        let no_timeout = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("RESOLVE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();
        assert!(no_timeout.validate().is_err());

        let half_spotify = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("SPOTIFY_CLIENT_ID", "id"),
        ]))
        .unwrap();
        assert!(half_spotify.validate().is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("idle grace 5s"));
    }
}
