use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{domain::ChatId, messaging::port::ChatTransport, Result};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between any two sends (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between sends to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return how long to wait before using it.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ChatTransport decorator that spaces out outbound replies.
///
/// Replies are delayed, never dropped, so the one-reply-per-message rule holds.
pub struct ThrottledTransport {
    inner: Arc<dyn ChatTransport>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledTransport {
    pub fn new(inner: Arc<dyn ChatTransport>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: ChatId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let now = Instant::now();
        let global_wait = { self.global.lock().await.reserve_at(now) };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve_at(now)
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            tracing::debug!(chat_id = chat_id.0, wait_ms = wait.as_millis() as u64, "throttling reply");
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for ThrottledTransport {
    fn max_message_len(&self) -> usize {
        self.inner.max_message_len()
    }

    async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.throttle_chat(chat_id).await;
        self.inner.send_reply(chat_id, text).await
    }
}
