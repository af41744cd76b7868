//! Inbound message router.
//!
//! Every inbound message is offered to the handlers in a fixed priority
//! order until one claims it: `/start`, then the bot-username trigger, then
//! the stage handler for whatever conversation is open in the chat. Commands
//! and new-bot triggers pre-empt an in-progress conversation so a user can
//! abandon one flow and start another.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Inbound;
use super::machine::ConversationMachine;
use super::store::ConversationStore;
use crate::language::LanguageHeuristic;
use crate::telegram::TelegramPort;

/// The start command, matched exactly.
const START_COMMAND: &str = "/start";

static BOT_HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:@?\w+bot|t\.me/\w+bot)$").expect("bot handle pattern must compile")
});

/// Whether a message text is a bot-username trigger.
#[must_use]
pub fn is_bot_handle(text: &str) -> bool {
    BOT_HANDLE_RE.is_match(text)
}

/// Outcome of a routing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// A handler processed the message.
    Claimed,

    /// No handler wanted the message.
    Unclaimed,
}

/// Dispatches each inbound message to at most one handler.
pub struct Router<P, H> {
    store: Arc<ConversationStore>,
    machine: ConversationMachine<P, H>,
}

impl<P: TelegramPort, H: LanguageHeuristic> Router<P, H> {
    /// Creates a router over the shared store and the state machine.
    pub fn new(store: Arc<ConversationStore>, machine: ConversationMachine<P, H>) -> Self {
        Self { store, machine }
    }

    /// Routes one inbound message.
    pub async fn dispatch(&self, msg: &Inbound) -> Claim {
        let text = msg.text.trim();

        if text == START_COMMAND {
            // Abandon any in-progress conversation, releasing its photo.
            self.store.clear(msg.chat_id()).await;
            self.machine.greet(msg).await;
            return Claim::Claimed;
        }

        if is_bot_handle(text) {
            self.machine.start(msg, text).await;
            return Claim::Claimed;
        }

        match self.store.pop(msg.chat_id()).await {
            Some(record) => {
                self.machine.advance(record, msg).await;
                Claim::Claimed
            }
            None => {
                debug!("Unclaimed message in chat {}", msg.chat_id());
                Claim::Unclaimed
            }
        }
    }
}
