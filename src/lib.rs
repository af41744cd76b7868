//! Promo Post Bot Library
//!
//! A Telegram bot that assembles promotional posts for other bots.
//!
//! This crate provides the core functionality for:
//! - Detecting a bot's language from its biography text
//! - Walking a user through a short dialogue (language, group, description)
//! - Rendering the fixed-layout promotional post
//! - Sending the post with the bot's profile photo as a captioned attachment

pub mod config;
pub mod conversation;
pub mod language;
pub mod post;
pub mod telegram;
