//! Conversation state machine.
//!
//! Sequences a chat through the dialogue stages and owns every terminal
//! path: successful post, format error, send error. Each path releases the
//! staged photo exactly once, and no raw fault ever reaches the user; every
//! failure is converted into one of the fixed Portuguese messages below.

use std::sync::Arc;

use tracing::{info, warn};

use super::record::{ConversationRecord, Stage, StagedPhoto};
use super::store::ConversationStore;
use super::Inbound;
use crate::language::{LanguageDetector, LanguageHeuristic, WhatlangHeuristic};
use crate::post::{PostError, format_post};
use crate::telegram::{PortError, TelegramPort};

/// Greeting sent in response to `/start`.
pub const GREETING: &str =
    "Olá! Envie o username ou link do bot que você quer criar uma postagem.";

const MSG_NOT_FOUND: &str =
    "❌ Não foi possível encontrar esse bot. Verifique se o username está correto e tente novamente.";
const MSG_NO_PHOTO: &str =
    "❌ Esse bot não tem foto de perfil ou não foi possível baixá-la.";
const MSG_NO_BIO: &str = "❌ Não foi possível ler a bio desse bot. Tente novamente.";
const MSG_NO_NAME: &str = "❌ Não foi possível obter o nome desse bot.";
const MSG_SEND_FAILED: &str = "❌ Não foi possível enviar a postagem. Tente novamente.";
const MSG_INTERNAL: &str = "❌ Ocorreu um erro inesperado. Tente novamente.";

/// Maps a collaborator error to its user-facing message.
fn user_message(error: &PortError) -> &'static str {
    match error {
        PortError::EntityNotFound => MSG_NOT_FOUND,
        PortError::PhotoUnavailable(_) => MSG_NO_PHOTO,
        PortError::DetectionUnavailable(_) => MSG_NO_BIO,
        PortError::Transport(_) => MSG_SEND_FAILED,
        PortError::Timeout | PortError::Internal(_) => MSG_INTERNAL,
    }
}

/// Normalizes a raw bot handle: strips a `t.me/` link down to its last path
/// segment and ensures the leading `@`.
#[must_use]
pub fn normalize_handle(raw: &str) -> String {
    let handle = raw.trim();
    let handle = if handle.to_lowercase().contains("t.me/") {
        handle.rsplit('/').next().unwrap_or(handle)
    } else {
        handle
    };

    if handle.starts_with('@') {
        handle.to_owned()
    } else {
        format!("@{handle}")
    }
}

/// The per-chat dialogue sequencer.
pub struct ConversationMachine<P, H = WhatlangHeuristic> {
    port: Arc<P>,
    store: Arc<ConversationStore>,
    detector: LanguageDetector<H>,
}

impl<P: TelegramPort, H: LanguageHeuristic> ConversationMachine<P, H> {
    /// Creates a machine over the given collaborators.
    pub fn new(
        port: Arc<P>,
        store: Arc<ConversationStore>,
        detector: LanguageDetector<H>,
    ) -> Self {
        Self {
            port,
            store,
            detector,
        }
    }

    /// Replies to `/start` with the greeting.
    pub async fn greet(&self, msg: &Inbound) {
        self.send_reply(msg, GREETING).await;
    }

    /// Begins a new conversation for a bot handle, replacing any stale one.
    ///
    /// On an early failure (resolve, photo, bio) the chat is left idle: no
    /// record is created and anything already staged is released, so the
    /// user can simply re-send the handle.
    pub async fn start(&self, msg: &Inbound, raw_handle: &str) {
        let handle = normalize_handle(raw_handle);
        info!("Starting conversation for {} in chat {}", handle, msg.chat_id());

        // A fresh trigger discards the previous conversation before anything
        // else; if starting the new one fails, the chat must end up idle,
        // not stuck in the old flow.
        self.store.clear(msg.chat_id()).await;

        match self.begin_conversation(msg, &handle).await {
            Ok(prompt) => self.send_reply(msg, &prompt).await,
            Err(e) => {
                warn!("Could not start conversation for {}: {}", handle, e);
                self.send_reply(msg, user_message(&e)).await;
            }
        }
    }

    async fn begin_conversation(
        &self,
        msg: &Inbound,
        handle: &str,
    ) -> Result<String, PortError> {
        let clean = handle.trim_start_matches('@');

        let profile = self.port.resolve(clean).await?;

        let photo_path = self
            .port
            .fetch_photo(&profile)
            .await?
            .ok_or_else(|| PortError::PhotoUnavailable("no profile photo set".to_owned()))?;
        let photo = StagedPhoto::new(photo_path);

        let bio = match self.port.fetch_bio(&profile).await {
            Ok(bio) => bio,
            Err(e) => {
                photo.release();
                return Err(e);
            }
        };

        let detection = self.detector.detect(bio.as_deref().unwrap_or(""));
        let (stage, prompt) = if detection.found {
            (
                Stage::AwaitingGroup {
                    language: detection.label.clone(),
                },
                prompt_group(handle, &detection.label),
            )
        } else {
            (Stage::AwaitingLanguage, prompt_manual_language(handle))
        };

        self.store
            .begin(ConversationRecord {
                chat: msg.chat,
                stage,
                username: handle.to_owned(),
                photo,
                original_message_id: Some(msg.message_id),
            })
            .await;

        Ok(prompt)
    }

    /// Advances a popped record with the user's reply.
    ///
    /// The router has already removed the record from the store; it is only
    /// re-inserted here when the conversation continues, which is what makes
    /// stage handling exclusive per chat.
    pub async fn advance(&self, mut record: ConversationRecord, msg: &Inbound) {
        // Replies are stored exactly as the user typed them.
        let text = msg.text.clone();

        match &record.stage {
            Stage::AwaitingLanguage => {
                let prompt = prompt_group(&record.username, &text);
                record.stage = Stage::AwaitingGroup { language: text };
                self.store.resume(record).await;
                self.send_reply(msg, &prompt).await;
            }
            Stage::AwaitingGroup { language } => {
                let language = language.clone();
                let prompt = prompt_description(&record.username, &language, &text);
                record.stage = Stage::AwaitingDescription {
                    language,
                    group: text,
                };
                self.store.resume(record).await;
                self.send_reply(msg, &prompt).await;
            }
            Stage::AwaitingDescription { language, group } => {
                let language = language.clone();
                let group = group.clone();
                self.finish(record, &language, &group, &text, msg).await;
            }
        }
    }

    /// Terminal stage: renders the post and sends it with the staged photo.
    async fn finish(
        &self,
        record: ConversationRecord,
        language: &str,
        group: &str,
        description: &str,
        msg: &Inbound,
    ) {
        let ConversationRecord {
            chat,
            username,
            photo,
            original_message_id,
            ..
        } = record;

        let reply_to = original_message_id.unwrap_or(msg.message_id);
        let clean = username.trim_start_matches('@');

        // The display name is fetched fresh so a renamed bot is posted
        // under its current name.
        let display_name = match self.port.resolve(clean).await {
            Ok(profile) => profile.display_name,
            Err(e) => {
                warn!("Could not refresh entity for {}: {}", username, e);
                photo.release();
                self.send_reply(msg, user_message(&e)).await;
                return;
            }
        };

        let caption = match format_post(&display_name, clean, language, group, description) {
            Ok(caption) => caption,
            Err(PostError::MissingDisplayName) => {
                warn!("Bot {} has no display name, aborting post", username);
                photo.release();
                self.send_reply(msg, MSG_NO_NAME).await;
                return;
            }
        };

        let sent = self
            .port
            .send_photo_with_caption(chat, photo.path(), &caption, reply_to)
            .await;
        photo.release();

        match sent {
            Ok(()) => info!("Posted promo for {} in chat {}", username, msg.chat_id()),
            Err(e) => {
                warn!("Failed to send post for {}: {}", username, e);
                self.send_reply(msg, MSG_SEND_FAILED).await;
            }
        }
    }

    async fn send_reply(&self, msg: &Inbound, text: &str) {
        if let Err(e) = self.port.reply(msg.chat, msg.message_id, text).await {
            warn!("Failed to reply in chat {}: {}", msg.chat_id(), e);
        }
    }
}

fn prompt_manual_language(username: &str) -> String {
    format!(
        "🤖 Bot: {username}\n\nNão consegui detectar o idioma pela bio. Qual é o idioma do bot?"
    )
}

fn prompt_group(username: &str, language: &str) -> String {
    format!("🤖 Bot: {username}\n🌐 Idioma: {language}\n\nAgora envie o nome do grupo:")
}

fn prompt_description(username: &str, language: &str, group: &str) -> String {
    format!(
        "🤖 Bot: {username}\n🌐 Idioma: {language}\n👥 Grupo: {group}\n\nAgora envie a descrição:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::test_support::{FakePort, MapHeuristic, inbound};

    const CHAT: i64 = 7;

    fn machine_with(
        port: &Arc<FakePort>,
        store: &Arc<ConversationStore>,
        heuristic: MapHeuristic,
    ) -> ConversationMachine<FakePort, MapHeuristic> {
        ConversationMachine::new(
            Arc::clone(port),
            Arc::clone(store),
            LanguageDetector::with_heuristic(heuristic),
        )
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("@samplebot"), "@samplebot");
        assert_eq!(normalize_handle("samplebot"), "@samplebot");
        assert_eq!(normalize_handle("t.me/samplebot"), "@samplebot");
        assert_eq!(normalize_handle("  T.me/samplebot  "), "@samplebot");
    }

    #[tokio::test]
    async fn test_detected_language_skips_language_stage() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        *port.bio.lock().unwrap() = Some("Hello there".to_owned());
        let machine = machine_with(&port, &store, MapHeuristic::of(&[("Hello there", "eng")]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;

        assert_eq!(
            store.stage_of(CHAT).await,
            Some(Stage::AwaitingGroup {
                language: "Inglês".to_owned()
            })
        );
        let replies = port.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("Idioma: Inglês"));
        assert!(replies[0].contains("nome do grupo"));
    }

    #[tokio::test]
    async fn test_empty_bio_enters_language_stage() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;

        assert_eq!(store.stage_of(CHAT).await, Some(Stage::AwaitingLanguage));
        let replies = port.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("Qual é o idioma do bot?"));
    }

    #[tokio::test]
    async fn test_replies_are_stored_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;

        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 2, " Russo ")).await;

        // Surrounding whitespace is the user's to keep.
        assert_eq!(
            store.stage_of(CHAT).await,
            Some(Stage::AwaitingGroup {
                language: " Russo ".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn test_resolve_failure_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        port.resolve_fails.store(true, std::sync::atomic::Ordering::SeqCst);
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;

        assert!(store.is_empty().await);
        assert_eq!(port.replies(), vec![MSG_NOT_FOUND.to_owned()]);
        // No photo was ever staged.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_restart_discards_prior_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@firstbot"), "@firstbot").await;
        assert!(store.contains(CHAT).await);

        // The second trigger fails to resolve; the first conversation must
        // not survive it.
        port.resolve_fails.store(true, std::sync::atomic::Ordering::SeqCst);
        machine.start(&inbound(CHAT, 2, "@secondbot"), "@secondbot").await;

        assert!(store.is_empty().await);
        assert_eq!(
            port.replies().last().map(String::as_str),
            Some(MSG_NOT_FOUND)
        );
        // The discarded conversation's photo went with it.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_photo_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        port.has_photo.store(false, std::sync::atomic::Ordering::SeqCst);
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;

        assert!(store.is_empty().await);
        assert_eq!(port.replies(), vec![MSG_NO_PHOTO.to_owned()]);
    }

    #[tokio::test]
    async fn test_bio_failure_releases_downloaded_photo() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        port.bio_fails.store(true, std::sync::atomic::Ordering::SeqCst);
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;

        assert!(store.is_empty().await);
        assert_eq!(port.replies(), vec![MSG_NO_BIO.to_owned()]);
        // The photo was downloaded before the bio fetch and must be gone.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stages_advance_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;
        assert_eq!(store.stage_of(CHAT).await, Some(Stage::AwaitingLanguage));

        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 2, "Russo")).await;
        assert_eq!(
            store.stage_of(CHAT).await,
            Some(Stage::AwaitingGroup {
                language: "Russo".to_owned()
            })
        );

        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 3, "Meu Grupo")).await;
        assert_eq!(
            store.stage_of(CHAT).await,
            Some(Stage::AwaitingDescription {
                language: "Russo".to_owned(),
                group: "Meu Grupo".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn test_terminal_stage_posts_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        port.observe_store(&store);
        *port.bio.lock().unwrap() = Some("Hello there".to_owned());
        let machine = machine_with(&port, &store, MapHeuristic::of(&[("Hello there", "eng")]));

        machine.start(&inbound(CHAT, 10, "@samplebot"), "@samplebot").await;
        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 11, "Meu Grupo")).await;
        let record = store.pop(CHAT).await.unwrap();
        machine
            .advance(record, &inbound(CHAT, 12, "Um bot de exemplo."))
            .await;

        let sent = port.sent();
        assert_eq!(sent.len(), 1);
        // Replies to the triggering message, not the last reply.
        assert_eq!(sent[0].reply_to, 10);
        // The record was removed before the post was produced.
        assert_eq!(sent[0].open_conversations, 0);
        assert!(sent[0].caption.contains("**SampleBot**"));
        assert!(sent[0].caption.contains("➧ Username: @samplebot"));
        assert!(sent[0].caption.contains("➧ Idioma: Inglês"));
        assert!(sent[0].caption.contains("➧ Grupo: Meu Grupo"));
        assert!(sent[0].caption.contains("Um bot de exemplo."));
        // The staged photo was released after the send.
        assert!(!sent[0].photo_path.exists());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_display_name_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        *port.display_name.lock().unwrap() = String::new();
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;
        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 2, "Inglês")).await;
        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 3, "Grupo")).await;
        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 4, "Descrição")).await;

        assert!(port.sent().is_empty());
        assert_eq!(port.replies().last().map(String::as_str), Some(MSG_NO_NAME));
        // Cleanup: no staged photo left behind and no open conversation.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_send_failure_still_releases_photo() {
        let dir = tempfile::tempdir().unwrap();
        let port = Arc::new(FakePort::new(dir.path()));
        let store = Arc::new(ConversationStore::new());
        port.send_fails.store(true, std::sync::atomic::Ordering::SeqCst);
        let machine = machine_with(&port, &store, MapHeuristic::of(&[]));

        machine.start(&inbound(CHAT, 1, "@samplebot"), "@samplebot").await;
        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 2, "Inglês")).await;
        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 3, "Grupo")).await;
        let record = store.pop(CHAT).await.unwrap();
        machine.advance(record, &inbound(CHAT, 4, "Descrição")).await;

        assert_eq!(
            port.replies().last().map(String::as_str),
            Some(MSG_SEND_FAILED)
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(store.is_empty().await);
    }
}
