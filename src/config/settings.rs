//! Runtime settings loaded from environment variables.
//!
//! `.env` is read by `dotenvy` in `main` before [`Settings::from_env`] runs, so
//! values may come from either place. A missing variable takes its default; a
//! value that fails to parse is a configuration error rather than a silent
//! fallback.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings for the Groq-compatible AI endpoints.
#[derive(Debug, Clone)]
pub struct GroqSettings {
    /// API key; AI features answer 502 when unset
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL
    pub base_url: String,
    /// Model used by the chatbot
    pub chat_model: String,
    /// Vision model used by the crop doctor
    pub vision_model: String,
    /// Speech-to-text model
    pub whisper_model: String,
}

/// All runtime settings for the server.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Socket address to listen on
    pub bind_addr: String,
    /// `SeaORM` connection string
    pub database_url: String,
    /// Lifetime of issued bearer tokens
    pub token_ttl_hours: i64,
    /// bcrypt cost for new password hashes
    pub password_hash_cost: u32,
    /// Where generated media (chat audio) is written
    pub media_dir: PathBuf,
    /// Public origin used to build media URLs
    pub public_base_url: String,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    /// How long a weather summary is reused
    pub weather_cache_ttl: Duration,
    /// Open-Meteo compatible forecast endpoint
    pub weather_base_url: String,
    /// Reference data file
    pub seed_config: PathBuf,
    /// AI provider settings
    pub groq: GroqSettings,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: text("BIND_ADDR", "0.0.0.0:8000"),
            database_url: text("DATABASE_URL", DEFAULT_DATABASE_URL),
            token_ttl_hours: parse_or(&lookup, "TOKEN_TTL_HOURS", 24)?,
            password_hash_cost: parse_or(&lookup, "PASSWORD_HASH_COST", bcrypt::DEFAULT_COST)?,
            media_dir: PathBuf::from(text("MEDIA_DIR", "media")),
            public_base_url: text("PUBLIC_BASE_URL", "http://localhost:8000")
                .trim_end_matches('/')
                .to_string(),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            cors_origins,
            weather_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "WEATHER_CACHE_TTL_SECS",
                600,
            )?),
            weather_base_url: text("WEATHER_BASE_URL", "https://api.open-meteo.com/v1/forecast"),
            seed_config: PathBuf::from(text("SEED_CONFIG", "config.toml")),
            groq: GroqSettings {
                api_key: lookup("GROQ_API_KEY").filter(|v| !v.trim().is_empty()),
                base_url: text("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
                chat_model: text("GROQ_CHAT_MODEL", "llama-3.3-70b-versatile"),
                vision_model: text(
                    "GROQ_VISION_MODEL",
                    "meta-llama/llama-4-scout-17b-16e-instruct",
                ),
                whisper_model: text("GROQ_WHISPER_MODEL", "whisper-large-v3"),
            },
        })
    }

    /// Token lifetime as a `chrono` duration.
    #[must_use]
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    /// Absolute URL for a path under the media directory.
    #[must_use]
    pub fn media_url(&self, relative: &str) -> String {
        format!("{}/media/{}", self.public_base_url, relative.trim_start_matches('/'))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| Error::Config {
            message: format!("{key}={raw:?} is invalid: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:8000");
        assert_eq!(settings.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(settings.token_ttl_hours, 24);
        assert_eq!(settings.password_hash_cost, bcrypt::DEFAULT_COST);
        assert_eq!(settings.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(settings.weather_cache_ttl, Duration::from_secs(600));
        assert!(settings.cors_origins.is_empty());
        assert!(settings.groq.api_key.is_none());
        assert_eq!(settings.groq.whisper_model, "whisper-large-v3");
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            ("TOKEN_TTL_HOURS", "2"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("PUBLIC_BASE_URL", "https://kisan.example/"),
            ("GROQ_API_KEY", "gsk_test"),
        ])
        .unwrap();
        assert_eq!(settings.token_ttl(), chrono::Duration::hours(2));
        assert_eq!(settings.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(settings.groq.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(
            settings.media_url("chat_audio/x.mp3"),
            "https://kisan.example/media/chat_audio/x.mp3"
        );
    }

    #[test]
    fn test_malformed_value_is_config_error() {
        let result = settings_from(&[("MAX_UPLOAD_BYTES", "lots")]);
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
