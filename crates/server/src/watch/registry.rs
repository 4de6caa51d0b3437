//! Pending subscription table keyed by chat id.

use crate::models::Chat;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::trace;
use uuid::Uuid;

type Slot = oneshot::Sender<Arc<Chat>>;

/// Pending one-shot subscriptions, grouped by chat id.
///
/// Every operation on a chat id goes through that id's shard lock, so
/// subscribe, unsubscribe and drain never interleave for the same chat.
#[derive(Clone, Default)]
pub struct WatchRegistry {
    watchers: Arc<DashMap<String, HashMap<Uuid, Slot>>>,
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("watched_chats", &self.watchers.len())
            .finish()
    }
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending subscription for the next change to `chat_id`.
    pub fn subscribe(&self, chat_id: &str) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.watchers.entry(chat_id.to_string()).or_default();
            // Slots whose receiver is already gone can be dropped here.
            pending.retain(|_, slot| !slot.is_closed());
            pending.insert(id, tx);
            trace!(
                chat_id,
                subscription_id = %id,
                pending = pending.len(),
                "Watcher registered"
            );
        }

        Subscription {
            id,
            chat_id: chat_id.to_string(),
            receiver: rx,
            registry: self.clone(),
        }
    }

    /// Cancel a pending subscription.
    ///
    /// Returns `true` if this call removed it. Calling it for a subscription
    /// that was already delivered or removed is a no-op.
    pub fn unsubscribe(&self, chat_id: &str, subscription_id: Uuid) -> bool {
        let mut removed = false;
        self.watchers.remove_if_mut(chat_id, |_, pending| {
            removed = pending.remove(&subscription_id).is_some();
            pending.is_empty()
        });
        if removed {
            trace!(chat_id, subscription_id = %subscription_id, "Watcher unregistered");
        }
        removed
    }

    /// Detach every pending subscription for `chat_id` in one step.
    ///
    /// Subscriptions registered after this returns wait for the next drain.
    pub(crate) fn drain(&self, chat_id: &str) -> Option<HashMap<Uuid, Slot>> {
        self.watchers.remove(chat_id).map(|(_, pending)| pending)
    }

    #[cfg(test)]
    pub(crate) fn register_slot(&self, chat_id: &str, slot: Slot) -> Uuid {
        let id = Uuid::new_v4();
        self.watchers
            .entry(chat_id.to_string())
            .or_default()
            .insert(id, slot);
        id
    }

    /// Number of pending subscriptions for one chat
    pub fn pending(&self, chat_id: &str) -> usize {
        self.watchers.get(chat_id).map_or(0, |pending| pending.len())
    }

    /// Number of chats with at least one pending subscription
    pub fn watched_chats(&self) -> usize {
        self.watchers.len()
    }
}

/// A pending watch on one chat.
///
/// Resolves to `Some(chat)` when a change is delivered, or `None` when the
/// slot was cancelled. Dropping it unregisters it from the registry.
pub struct Subscription {
    id: Uuid,
    chat_id: String,
    receiver: oneshot::Receiver<Arc<Chat>>,
    registry: WatchRegistry,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Give up on this watch.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Future for Subscription {
    type Output = Option<Arc<Chat>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.chat_id, self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("chat_id", &self.chat_id)
            .finish()
    }
}
