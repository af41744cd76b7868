//! Telegram client wrapper.
//!
//! Wraps the grammers client behind the [`TelegramPort`] contract the
//! conversation core consumes, plus the connection and bot-token sign-in
//! plumbing. Every network call is bounded by the configured request
//! timeout.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use grammers_client::types::Chat;
use grammers_client::{Client, Config, InitParams, InputMessage, InvocationError, Update};
use grammers_session::{PackedChat, Session};
use grammers_tl_types as tl;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::port::{BotProfile, PortError, TelegramPort};
use super::rate_limiter::RateLimiter;
use crate::config::{BotSettings, TelegramConfig};

/// Errors that can occur outside the conversation flow (connection,
/// authorization, update stream).
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        if let Some(idx) = err_msg.to_lowercase().find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = err_msg[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Rate limiter for outbound sends.
    rate_limiter: RateLimiter,

    /// Directory where profile photos are staged.
    photo_dir: PathBuf,

    /// Bound applied to every API call.
    request_timeout: Duration,

    /// Where the session is persisted.
    session_path: PathBuf,

    /// Per-process counter for unique photo file names.
    download_seq: AtomicU64,
}

impl TelegramBot {
    /// Connects to Telegram with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded or the connection
    /// fails.
    pub async fn connect(
        config: &TelegramConfig,
        settings: &BotSettings,
    ) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Session::load_file_or_create(&config.session_path)
            .map_err(|e| TelegramError::Session(e.to_string()))?;

        let client = Client::connect(Config {
            session,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| TelegramError::Connection(e.to_string()))?;

        std::fs::create_dir_all(&settings.photo_dir)
            .map_err(|e| TelegramError::Session(e.to_string()))?;

        info!("Connected to Telegram");

        Ok(Self {
            client,
            rate_limiter: RateLimiter::from_secs(settings.send_interval_secs),
            photo_dir: settings.photo_dir.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            session_path: config.session_path.clone(),
            download_seq: AtomicU64::new(0),
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Signs in as a bot with the given token.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in_bot(&self, token: &str) -> Result<(), TelegramError> {
        info!("Signing in as bot {}...", mask_token(token));

        self.client
            .bot_sign_in(token)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))?;

        self.save_session()?;
        info!("Successfully signed in");
        Ok(())
    }

    /// Persists the session to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub fn save_session(&self) -> Result<(), TelegramError> {
        self.client
            .session()
            .save_to_file(&self.session_path)
            .map_err(|e| TelegramError::Session(e.to_string()))
    }

    /// Waits for the next update from Telegram.
    ///
    /// # Errors
    ///
    /// Returns an error if the update stream fails.
    pub async fn next_update(&self) -> Result<Update, TelegramError> {
        self.client
            .next_update()
            .await
            .map_err(|e| TelegramError::Invocation(e.to_string()))
    }

    /// Applies the request timeout to an API call.
    async fn timed<T>(&self, fut: impl Future<Output = T> + Send) -> Result<T, PortError> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| PortError::Timeout)
    }

    /// Resolves a username to its chat, classifying `USERNAME_*` RPC errors
    /// as not-found.
    async fn resolve_chat(&self, handle: &str) -> Result<Chat, PortError> {
        let resolved = self
            .timed(self.client.resolve_username(handle))
            .await?
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("USERNAME") {
                    PortError::EntityNotFound
                } else {
                    PortError::Internal(msg)
                }
            })?;

        resolved.ok_or(PortError::EntityNotFound)
    }

    /// Converts a failed send into a transport error, honoring flood waits.
    async fn transport_error(&self, error: InvocationError) -> PortError {
        let msg = error.to_string();
        if let Some(seconds) = extract_flood_wait_seconds(&msg) {
            self.rate_limiter.handle_flood_wait(seconds).await;
        }
        PortError::Transport(msg)
    }
}

impl TelegramPort for TelegramBot {
    async fn resolve(&self, handle: &str) -> Result<BotProfile, PortError> {
        debug!("Resolving @{}", handle);
        let chat = self.resolve_chat(handle).await?;

        Ok(BotProfile {
            chat: chat.pack(),
            display_name: chat.name().to_owned(),
            username: chat
                .username()
                .map_or_else(|| handle.to_owned(), str::to_owned),
        })
    }

    async fn fetch_photo(&self, bot: &BotProfile) -> Result<Option<PathBuf>, PortError> {
        // Re-resolve to get a full chat object; the packed reference alone
        // cannot produce a downloadable photo location.
        let chat = self
            .resolve_chat(&bot.username)
            .await
            .map_err(|e| PortError::PhotoUnavailable(e.to_string()))?;

        let Some(downloadable) = chat.photo_downloadable(true) else {
            debug!("@{} has no profile photo", bot.username);
            return Ok(None);
        };

        let seq = self.download_seq.fetch_add(1, Ordering::Relaxed);
        let path = self
            .photo_dir
            .join(format!("bot_photo_{}_{}.jpg", bot.chat.id, seq));

        self.timed(self.client.download_media(&downloadable, &path))
            .await?
            .map_err(|e| PortError::PhotoUnavailable(e.to_string()))?;

        debug!("Downloaded profile photo to {}", path.display());
        Ok(Some(path))
    }

    async fn fetch_bio(&self, bot: &BotProfile) -> Result<Option<String>, PortError> {
        let request = tl::functions::users::GetFullUser {
            id: tl::enums::InputUser::User(tl::types::InputUser {
                user_id: bot.chat.id,
                access_hash: bot.chat.access_hash.unwrap_or_default(),
            }),
        };

        let result = self
            .timed(self.client.invoke(&request))
            .await?
            .map_err(|e| PortError::DetectionUnavailable(e.to_string()))?;

        let tl::enums::users::UserFull::Full(full) = result;
        let tl::enums::UserFull::Full(user_full) = full.full_user;

        Ok(user_full.about.filter(|about| !about.is_empty()))
    }

    async fn reply(&self, chat: PackedChat, reply_to: i32, text: &str) -> Result<(), PortError> {
        self.rate_limiter.wait_and_acquire().await;

        let message = InputMessage::text(text).reply_to(Some(reply_to));
        match self.timed(self.client.send_message(chat, message)).await? {
            Ok(_) => Ok(()),
            Err(e) => Err(self.transport_error(e).await),
        }
    }

    async fn send_photo_with_caption(
        &self,
        chat: PackedChat,
        photo: &Path,
        caption: &str,
        reply_to: i32,
    ) -> Result<(), PortError> {
        self.rate_limiter.wait_and_acquire().await;

        let uploaded = self
            .timed(self.client.upload_file(photo))
            .await?
            .map_err(|e| PortError::Transport(e.to_string()))?;

        let message = InputMessage::markdown(caption)
            .photo(uploaded)
            .reply_to(Some(reply_to));

        match self.timed(self.client.send_message(chat, message)).await? {
            Ok(_) => {
                info!("Sent post to chat {}", chat.id);
                Ok(())
            }
            Err(e) => {
                warn!("Send failed in chat {}: {}", chat.id, e);
                Err(self.transport_error(e).await)
            }
        }
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("photo_dir", &self.photo_dir)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Masks a bot token for logging (shows the numeric bot id only).
fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "***".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("123456:ABC-secret"), "123456:***");
        assert_eq!(mask_token("no-colon"), "***");
    }

    #[test]
    fn test_extract_flood_wait() {
        assert_eq!(extract_flood_wait_seconds("FLOOD_WAIT_120"), Some(120));
        assert_eq!(extract_flood_wait_seconds("flood wait 60 seconds"), Some(60));
        assert_eq!(extract_flood_wait_seconds("some other error"), None);
    }
}
