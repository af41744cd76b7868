//! Application settings and Telegram configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Bot token (obtain from @BotFather).
    pub bot_token: String,

    /// Path to the session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("bot_session.session")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String, bot_token: String) -> Self {
        Self {
            api_id,
            api_hash,
            bot_token,
            session_path: default_session_path(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID`, `TG_API_HASH` and `BOT_TOKEN` to be set.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let bot_token = std::env::var("BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("BOT_TOKEN"))?;

        let session_path = std::env::var("TG_SESSION_PATH")
            .map_or_else(|_| default_session_path(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            bot_token,
            session_path,
        })
    }
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Directory where downloaded profile photos are staged.
    #[serde(default = "default_photo_dir")]
    pub photo_dir: PathBuf,

    /// Timeout applied to every Telegram API call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Minimum interval between outbound sends in seconds (rate limit protection).
    #[serde(default = "default_send_interval")]
    pub send_interval_secs: u64,

    /// Log level for the application.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_photo_dir() -> PathBuf {
    PathBuf::from("photos")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_send_interval() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            photo_dir: default_photo_dir(),
            request_timeout_secs: default_request_timeout(),
            send_interval_secs: default_send_interval(),
            log_level: default_log_level(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            photo_dir: std::env::var("PHOTO_DIR")
                .map_or_else(|_| default_photo_dir(), PathBuf::from),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_request_timeout),
            send_interval_secs: std::env::var("SEND_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_send_interval),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| default_log_level()),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = BotSettings::default();
        assert_eq!(settings.photo_dir, PathBuf::from("photos"));
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.send_interval_secs, 1);
    }

    #[test]
    fn test_telegram_config_new() {
        let config = TelegramConfig::new(12345, "abc123".to_owned(), "42:token".to_owned());
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.api_hash, "abc123");
        assert_eq!(config.bot_token, "42:token");
        assert_eq!(config.session_path, PathBuf::from("bot_session.session"));
    }
}
