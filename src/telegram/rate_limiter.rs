//! Rate limiter for outbound messages.
//!
//! Telegram allows roughly one message per second per chat and answers
//! bursts with `FLOOD_WAIT`. Log and error notifications go through this
//! limiter so a noisy failure loop cannot get the account restricted.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default spacing between two messages to the same chat.
pub const DEFAULT_CHAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct LimiterState {
    /// Last send per chat.
    last_sent: HashMap<i64, Instant>,
    /// Global pause set by a flood wait.
    paused_until: Option<Instant>,
}

/// Per-chat rate limiter with a global flood-wait pause.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between two messages to the same chat.
    min_interval: Duration,

    state: Mutex<LimiterState>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_INTERVAL)
    }
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified per-chat interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Waits until a message to `chat_id` is allowed, then records the send.
    ///
    /// The slot is reserved before sleeping, so waiting on one chat never
    /// holds up another and concurrent sends to one chat queue in order.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn acquire(&self, chat_id: i64) -> Duration {
        let wait = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let wait = Self::wait_for(&state, chat_id, self.min_interval, now);
            state.last_sent.insert(chat_id, now + wait);
            if state.paused_until.is_some_and(|until| until <= now) {
                state.paused_until = None;
            }
            wait
        };

        if !wait.is_zero() {
            debug!("Rate limiter: waiting {:?} before messaging {}", wait, chat_id);
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Time until a message to `chat_id` would be allowed.
    pub async fn time_until_allowed(&self, chat_id: i64) -> Duration {
        let state = self.state.lock().await;
        Self::wait_for(&state, chat_id, self.min_interval, Instant::now())
    }

    /// Pauses every chat for the flood wait Telegram asked for.
    pub async fn handle_flood_wait(&self, wait_seconds: u32) {
        warn!("Received flood wait from Telegram: {} seconds", wait_seconds);
        let until = Instant::now() + Duration::from_secs(u64::from(wait_seconds));
        let mut state = self.state.lock().await;
        state.paused_until = Some(state.paused_until.map_or(until, |p| p.max(until)));
    }

    /// Forgets all history, allowing immediate sends.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = LimiterState::default();
    }

    fn wait_for(state: &LimiterState, chat_id: i64, min_interval: Duration, now: Instant) -> Duration {
        // A reserved slot may lie in the future
        let chat_wait = state
            .last_sent
            .get(&chat_id)
            .map_or(Duration::ZERO, |last| (*last + min_interval).saturating_duration_since(now));
        let pause_wait = state
            .paused_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now));
        chat_wait.max(pause_wait)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_first_message_is_immediate() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.time_until_allowed(1).await, Duration::ZERO);
        assert_eq!(limiter.acquire(1).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_same_chat_waits_other_chat_does_not() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        limiter.acquire(1).await;

        assert!(limiter.time_until_allowed(1).await > Duration::ZERO);
        assert_eq!(limiter.time_until_allowed(2).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_flood_wait_pauses_all_chats() {
        let limiter = RateLimiter::new(Duration::from_millis(1));
        limiter.handle_flood_wait(30).await;

        assert!(limiter.time_until_allowed(1).await > Duration::from_secs(20));
        assert!(limiter.time_until_allowed(99).await > Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_reset() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        limiter.acquire(5).await;
        limiter.handle_flood_wait(60).await;

        limiter.reset().await;
        assert_eq!(limiter.time_until_allowed(5).await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_chat_does_not_block_others() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60)));
        limiter.acquire(1).await;

        let waiting = Arc::clone(&limiter);
        let slow = tokio::spawn(async move { waiting.acquire(1).await });
        tokio::task::yield_now().await;

        let other = tokio::time::timeout(Duration::from_millis(10), limiter.acquire(2)).await;
        assert_eq!(other.unwrap(), Duration::ZERO);

        assert_eq!(slow.await.unwrap(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_chat_sends_queue_in_order() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_eq!(limiter.acquire(3).await, Duration::ZERO);
        assert_eq!(limiter.acquire(3).await, Duration::from_secs(1));
        assert_eq!(limiter.time_until_allowed(3).await, Duration::from_secs(1));
    }
}
