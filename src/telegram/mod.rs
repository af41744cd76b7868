//! Telegram client wrapper module.
//!
//! Provides the [`TelegramPort`] contract the conversation core talks to,
//! its grammers-backed implementation, and outbound rate limiting.

mod client;
mod port;
mod rate_limiter;

pub use client::{TelegramBot, TelegramError};
pub use grammers_client::Update;
pub use port::{BotProfile, PortError, TelegramPort};
pub use rate_limiter::RateLimiter;
