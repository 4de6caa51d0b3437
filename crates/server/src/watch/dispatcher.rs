//! Fan-out of a chat change to every pending watch.

use super::registry::WatchRegistry;
use crate::models::Chat;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, trace};
use uuid::Uuid;

/// Snapshots at or below this size are delivered on the caller's task.
const INLINE_DELIVERY_LIMIT: usize = 32;

/// Delivers a changed chat to the watches pending on it, exactly once each.
#[derive(Clone, Debug)]
pub struct NotificationDispatcher {
    registry: WatchRegistry,
}

impl NotificationDispatcher {
    pub fn new(registry: WatchRegistry) -> Self {
        Self { registry }
    }

    /// Detach the pending watches for `chat_id` and hand `chat` to each.
    ///
    /// Never awaits: the pending set is swapped out of the registry in one
    /// step and delivered from the detached snapshot, either inline or on a
    /// spawned task when the snapshot is large. Returns the snapshot size.
    pub fn notify(&self, chat_id: &str, chat: Arc<Chat>) -> usize {
        let Some(pending) = self.registry.drain(chat_id) else {
            trace!(chat_id, "No watchers to notify");
            return 0;
        };

        let count = pending.len();
        if count <= INLINE_DELIVERY_LIMIT {
            deliver(chat_id, pending, chat);
        } else {
            let chat_id = chat_id.to_string();
            tokio::spawn(async move {
                deliver(&chat_id, pending, chat);
            });
        }
        count
    }
}

fn deliver(chat_id: &str, pending: HashMap<Uuid, oneshot::Sender<Arc<Chat>>>, chat: Arc<Chat>) {
    let total = pending.len();
    let mut delivered = 0;
    for (subscription_id, slot) in pending {
        if slot.send(chat.clone()).is_ok() {
            delivered += 1;
        } else {
            // Receiver went away between drain and send.
            trace!(chat_id, subscription_id = %subscription_id, "Discarded delivery to closed watcher");
        }
    }
    debug!(
        chat_id,
        delivered,
        discarded = total - delivered,
        messages = chat.messages.len(),
        "Dispatched chat update"
    );
}
