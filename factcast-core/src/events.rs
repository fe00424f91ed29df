//! Feed event fan-out.
//!
//! Explicit publish/subscribe registry owned by the composition root, with a
//! real subscribe/unsubscribe lifecycle. Screens listen for these to refresh
//! the feed after the engine surfaces new content.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Past-due or immediate content entered the feed.
    FeedRefreshed { newly_shown: usize },
    /// The pending schedule was rebuilt or topped up.
    ScheduleChanged { scheduled: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
pub struct FeedEvents {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<FeedEvent>>>,
}

impl FeedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<FeedEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        (SubscriptionId(id), rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().remove(&id.0);
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn publish(&self, event: FeedEvent) {
        self.lock().retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<FeedEvent>>> {
        self.subscribers.lock().expect("subscriber registry poisoned")
    }
}
