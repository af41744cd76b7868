//! Per-chat conversation state.

use std::fs;
use std::path::{Path, PathBuf};

use grammers_session::PackedChat;
use tracing::{debug, warn};

/// Position of a conversation within the dialogue sequence.
///
/// The collected fields live inside the stage itself, so a record can never
/// hold a group without a language or reach the terminal stage with either
/// missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the user to supply the language manually.
    AwaitingLanguage,

    /// Waiting for the group name.
    AwaitingGroup { language: String },

    /// Waiting for the description (terminal stage).
    AwaitingDescription { language: String, group: String },
}

/// A downloaded profile photo staged on the local filesystem.
///
/// The file is deleted exactly once: either through an explicit
/// [`StagedPhoto::release`] on a terminal path, or by the drop backstop when
/// a record is discarded (replaced conversation, `/start`, handler error).
#[derive(Debug)]
pub struct StagedPhoto {
    path: PathBuf,
    released: bool,
}

impl StagedPhoto {
    /// Takes ownership of a downloaded photo file.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    /// Path of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the staged file.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released staged photo: {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove staged photo {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for StagedPhoto {
    fn drop(&mut self) {
        self.remove();
    }
}

/// In-progress conversation data for a single chat.
#[derive(Debug)]
pub struct ConversationRecord {
    /// Chat the conversation belongs to.
    pub chat: PackedChat,

    /// Current stage, carrying the fields collected so far.
    pub stage: Stage,

    /// The target bot's normalized handle, always `@`-prefixed.
    pub username: String,

    /// The staged profile photo, owned by this record until consumed.
    pub photo: StagedPhoto,

    /// Id of the message that initiated the conversation; the final post
    /// replies to this one.
    pub original_message_id: Option<i32>,
}

impl ConversationRecord {
    /// Chat identity this record is keyed by.
    #[must_use]
    pub fn chat_id(&self) -> i64 {
        self.chat.id
    }
}
