//! Promo Post Bot - Main Entry Point
//!
//! A Telegram bot that downloads another bot's profile photo, detects its
//! language from the biography, collects the remaining fields in a short
//! dialogue and posts a formatted promotional post.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use promo_post_bot::config::{BotSettings, TelegramConfig};
use promo_post_bot::conversation::{ConversationMachine, ConversationStore, Inbound, Router};
use promo_post_bot::language::LanguageDetector;
use promo_post_bot::telegram::{TelegramBot, Update};

/// Telegram bot that assembles promotional posts for other bots.
#[derive(Parser, Debug)]
#[command(name = "promo_post_bot")]
#[command(about = "Assemble promotional posts for Telegram bots")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let settings = BotSettings::from_env_with_defaults();

    // Connect to Telegram
    let bot = TelegramBot::connect(&tg_config, &settings)
        .await
        .context("Failed to connect to Telegram")?;

    // Handle authorization if needed
    if !bot.is_authorized().await.context("Failed to check authorization")? {
        bot.sign_in_bot(&tg_config.bot_token)
            .await
            .context("Bot sign in failed")?;
    }

    let bot = Arc::new(bot);
    let store = Arc::new(ConversationStore::new());
    let machine = ConversationMachine::new(
        Arc::clone(&bot),
        Arc::clone(&store),
        LanguageDetector::new(),
    );
    let router = Arc::new(Router::new(Arc::clone(&store), machine));

    info!("Bot started. Use Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            update = bot.next_update() => {
                match update {
                    Ok(Update::NewMessage(message)) if !message.outgoing() => {
                        let inbound = Inbound {
                            chat: message.chat().pack(),
                            message_id: message.id(),
                            text: message.text().to_owned(),
                        };
                        let router = Arc::clone(&router);
                        // One task per message; per-chat exclusivity is
                        // enforced by the store's pop semantics.
                        tokio::spawn(async move {
                            router.dispatch(&inbound).await;
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Update stream error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    // Cleanup
    if let Err(e) = bot.save_session() {
        warn!("Failed to save session: {}", e);
    }

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
