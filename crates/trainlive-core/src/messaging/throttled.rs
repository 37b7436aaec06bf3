//! Outbound pacing for station updates.
//!
//! A poll cycle can find many trains at new stations at once, and one chat may
//! follow several of them. Each send is given a slot that respects both a
//! global spacing and a per-chat spacing. Chats whose last slot is already in
//! the past are forgotten, so the table only holds chats with pending traffic.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between any two Telegram calls.
    pub global_min_interval: Duration,
    /// Minimum spacing between calls to the same chat.
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
struct SendSlots {
    global_next: Instant,
    /// Earliest next slot per chat. Entries in the past are pruned.
    chat_next: HashMap<ChatId, Instant>,
}

impl SendSlots {
    fn new() -> Self {
        Self {
            global_next: Instant::now(),
            chat_next: HashMap::new(),
        }
    }

    /// Book the next slot for `chat_id` and return how long to wait for it.
    fn book(&mut self, chat_id: ChatId, cfg: &ThrottleConfig) -> Duration {
        let now = Instant::now();
        self.chat_next.retain(|_, next| *next > now);

        let mut start = now.max(self.global_next);
        if let Some(next) = self.chat_next.get(&chat_id) {
            start = start.max(*next);
        }

        self.global_next = start + cfg.global_min_interval;
        self.chat_next
            .insert(chat_id, start + cfg.per_chat_min_interval);
        start - now
    }
}

/// MessagingPort decorator that paces outbound calls.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    slots: Mutex<SendSlots>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            slots: Mutex::new(SendSlots::new()),
        }
    }

    async fn wait_turn(&self, chat_id: ChatId) {
        let wait = self.slots.lock().await.book(chat_id, &self.cfg);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    /// Chats that still have a booked slot ahead.
    #[cfg(test)]
    async fn pending_chats(&self) -> usize {
        self.slots.lock().await.chat_next.len()
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.wait_turn(chat_id).await;
        self.inner.send_html(chat_id, html).await
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.wait_turn(msg.chat_id).await;
        self.inner.edit_html(msg, html).await
    }
}
