//! Shared store of in-progress conversations.
//!
//! Exclusivity rule: handlers never mutate a record inside the store. A
//! handler pops the record (taking ownership), works on it across await
//! points, and re-inserts it if the conversation continues. A concurrent
//! message for the same chat finds no record while one is popped and goes
//! unclaimed, so no two handlers can interleave on the same chat's state.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use super::record::{ConversationRecord, Stage};

/// Mapping from chat identity to its in-progress conversation.
#[derive(Debug, Default)]
pub struct ConversationStore {
    records: Mutex<HashMap<i64, ConversationRecord>>,
}

impl ConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a freshly created record, replacing any stale one.
    ///
    /// A replaced record is dropped here, which releases its staged photo.
    pub async fn begin(&self, record: ConversationRecord) {
        let chat_id = record.chat_id();
        let replaced = self.records.lock().await.insert(chat_id, record);
        if replaced.is_some() {
            debug!("Replaced stale conversation for chat {}", chat_id);
        }
    }

    /// Removes and returns the record for a chat, if one exists.
    ///
    /// The caller becomes the exclusive owner; the conversation only
    /// continues if the record is re-inserted via [`Self::resume`].
    pub async fn pop(&self, chat_id: i64) -> Option<ConversationRecord> {
        self.records.lock().await.remove(&chat_id)
    }

    /// Puts a popped record back so the conversation can continue.
    pub async fn resume(&self, record: ConversationRecord) {
        self.records.lock().await.insert(record.chat_id(), record);
    }

    /// Discards any record for a chat, releasing its staged photo.
    pub async fn clear(&self, chat_id: i64) {
        if self.records.lock().await.remove(&chat_id).is_some() {
            debug!("Cleared conversation for chat {}", chat_id);
        }
    }

    /// Returns the current stage of a chat's conversation, if any.
    pub async fn stage_of(&self, chat_id: i64) -> Option<Stage> {
        self.records
            .lock()
            .await
            .get(&chat_id)
            .map(|r| r.stage.clone())
    }

    /// Whether a conversation is in progress for the chat.
    pub async fn contains(&self, chat_id: i64) -> bool {
        self.records.lock().await.contains_key(&chat_id)
    }

    /// Number of open conversations.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether no conversation is open.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::record::StagedPhoto;
    use grammers_session::{PackedChat, PackedType};

    fn record_with_photo(chat_id: i64, dir: &std::path::Path, name: &str) -> ConversationRecord {
        let path = dir.join(name);
        std::fs::write(&path, b"jpeg").unwrap();
        ConversationRecord {
            chat: PackedChat {
                ty: PackedType::User,
                id: chat_id,
                access_hash: Some(0),
            },
            stage: Stage::AwaitingLanguage,
            username: "@samplebot".to_owned(),
            photo: StagedPhoto::new(path),
            original_message_id: Some(1),
        }
    }

    #[tokio::test]
    async fn test_begin_replaces_and_releases_old_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new();

        store.begin(record_with_photo(7, dir.path(), "old.jpg")).await;
        let old = dir.path().join("old.jpg");
        assert!(old.exists());

        store.begin(record_with_photo(7, dir.path(), "new.jpg")).await;
        assert!(!old.exists(), "replaced record must release its photo");
        assert!(dir.path().join("new.jpg").exists());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_pop_gives_exclusive_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new();
        store.begin(record_with_photo(7, dir.path(), "p.jpg")).await;

        let record = store.pop(7).await;
        assert!(record.is_some());
        // A second claimant finds nothing.
        assert!(store.pop(7).await.is_none());

        store.resume(record.unwrap()).await;
        assert!(store.contains(7).await);
    }

    #[tokio::test]
    async fn test_clear_releases_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new();
        store.begin(record_with_photo(7, dir.path(), "p.jpg")).await;

        store.clear(7).await;
        assert!(!dir.path().join("p.jpg").exists());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_stage_of() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new();
        assert_eq!(store.stage_of(7).await, None);

        store.begin(record_with_photo(7, dir.path(), "p.jpg")).await;
        assert_eq!(store.stage_of(7).await, Some(Stage::AwaitingLanguage));
    }
}
