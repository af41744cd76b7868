//! Collaborator contract between the conversation core and Telegram.
//!
//! The state machine only ever talks to Telegram through [`TelegramPort`],
//! which keeps the core testable against a fake and the grammers client an
//! implementation detail of [`super::TelegramBot`].

use std::path::{Path, PathBuf};

use grammers_session::PackedChat;
use thiserror::Error;

/// Errors surfaced by the Telegram collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The handle is malformed or no such bot exists.
    #[error("bot entity not found")]
    EntityNotFound,

    /// The bot has no profile photo or the download failed.
    #[error("profile photo unavailable: {0}")]
    PhotoUnavailable(String),

    /// The biography could not be fetched (distinct from "no language found").
    #[error("biography unavailable: {0}")]
    DetectionUnavailable(String),

    /// An external call exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// A send or reply failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Catch-all for unexpected failures.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A resolved bot entity.
#[derive(Debug, Clone)]
pub struct BotProfile {
    /// Packed chat reference for follow-up API calls.
    pub chat: PackedChat,

    /// The bot's display name (may be empty if Telegram returned none).
    pub display_name: String,

    /// The bot's username without the leading `@`.
    pub username: String,
}

/// Operations the conversation core needs from Telegram.
pub trait TelegramPort {
    /// Resolves a bot handle (without `@`) to its entity.
    fn resolve(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<BotProfile, PortError>> + Send;

    /// Downloads the bot's profile photo to local storage.
    ///
    /// Returns `Ok(None)` if the bot has no profile photo set.
    fn fetch_photo(
        &self,
        bot: &BotProfile,
    ) -> impl Future<Output = Result<Option<PathBuf>, PortError>> + Send;

    /// Fetches the bot's biography text, if any.
    fn fetch_bio(
        &self,
        bot: &BotProfile,
    ) -> impl Future<Output = Result<Option<String>, PortError>> + Send;

    /// Sends a plain text reply into a chat.
    fn reply(
        &self,
        chat: PackedChat,
        reply_to: i32,
        text: &str,
    ) -> impl Future<Output = Result<(), PortError>> + Send;

    /// Sends a photo with a markdown caption, replying to a message.
    fn send_photo_with_caption(
        &self,
        chat: PackedChat,
        photo: &Path,
        caption: &str,
        reply_to: i32,
    ) -> impl Future<Output = Result<(), PortError>> + Send;
}
