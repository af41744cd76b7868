//! Conversational core.
//!
//! The conversation walks a fixed topology: bot handle → (optional manual
//! language) → group → description → formatted post. The router claims each
//! inbound message for at most one handler, the store keeps the only shared
//! mutable state, and the machine sequences the stages.

mod machine;
mod record;
mod router;
mod store;

pub use machine::{ConversationMachine, normalize_handle};
pub use record::{ConversationRecord, Stage, StagedPhoto};
pub use router::{Claim, Router, is_bot_handle};
pub use store::ConversationStore;

use grammers_session::PackedChat;

/// An inbound message as seen by the router and stage handlers.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Chat the message arrived in.
    pub chat: PackedChat,

    /// Message id, used as the reply target.
    pub message_id: i32,

    /// Raw message text.
    pub text: String,
}

impl Inbound {
    /// Chat identity, the conversation isolation key.
    #[must_use]
    pub fn chat_id(&self) -> i64 {
        self.chat.id
    }
}
