//! Configuration module for the promo post bot.
//!
//! Handles Telegram API credentials, runtime settings and the static
//! language code table used by the detector.

mod languages;
mod settings;

pub use languages::{UNKNOWN_LANGUAGE, language_label};
pub use settings::{BotSettings, ConfigError, TelegramConfig};
