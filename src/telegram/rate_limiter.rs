//! Rate limiter for outbound Telegram sends.
//!
//! Enforces a minimum interval between sends so a busy group cannot drive
//! the bot into Telegram's flood wait errors, and honors the server-mandated
//! pause when one happens anyway.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Enforces a minimum interval between operations.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between allowed operations.
    min_interval: Duration,

    /// Last time an operation was performed.
    last_operation: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_operation: Mutex::new(None),
        }
    }

    /// Creates a rate limiter from seconds.
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Waits until an operation is allowed, then marks it as performed.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut last = self.last_operation.lock().await;

        let wait_duration = if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                self.min_interval - elapsed
            } else {
                Duration::ZERO
            }
        } else {
            Duration::ZERO
        };

        if !wait_duration.is_zero() {
            debug!(
                "Rate limiter: waiting {:?} before next send",
                wait_duration
            );
            tokio::time::sleep(wait_duration).await;
        }

        *last = Some(Instant::now());
        wait_duration
    }

    /// Handles a flood wait error from Telegram by sleeping it out.
    pub async fn handle_flood_wait(&self, wait_seconds: u32) {
        warn!(
            "Received flood wait from Telegram: {} seconds",
            wait_seconds
        );
        // We'll need to wait at least this long before the next operation
        tokio::time::sleep(Duration::from_secs(u64::from(wait_seconds))).await;

        // Mark as just performed so the rate limiter knows to wait
        let mut last = self.last_operation.lock().await;
        *last = Some(Instant::now());
    }
}
