//! Per-chat serialization of read-modify-write cycles.
//!
//! [`ChatLocks`] hands out one async mutex per chat id. Entries are created on
//! first use and removed again once the last holder or waiter lets go, so the
//! table only ever contains chats with a mutation in flight.

use crate::error::Result;
use crate::models::{Chat, ChatMessage};
use crate::store::{validate_chat_id, ChatStore};
use crate::watch::NotificationDispatcher;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, trace};

type LockTable = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Table of per-chat mutation guards.
#[derive(Clone, Default)]
pub struct ChatLocks {
    locks: LockTable,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `chat_id`.
    ///
    /// Dropping the returned future while it waits releases its claim on the
    /// table entry just like dropping the guard does.
    pub async fn lock(&self, chat_id: &str) -> ChatGuard {
        let ticket = LockTicket {
            chat_id: chat_id.to_string(),
            lock: self.locks.entry(chat_id.to_string()).or_default().clone(),
            locks: self.locks.clone(),
        };
        let guard = ticket.lock.clone().lock_owned().await;
        trace!(chat_id, "Chat guard acquired");
        ChatGuard {
            _guard: guard,
            _ticket: ticket,
        }
    }

    /// Number of chats that currently have a guard entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl std::fmt::Debug for ChatLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatLocks")
            .field("active", &self.locks.len())
            .finish()
    }
}

/// A claim on one table entry. Removes the entry when it is the last claim.
struct LockTicket {
    chat_id: String,
    lock: Arc<Mutex<()>>,
    locks: LockTable,
}

impl Drop for LockTicket {
    fn drop(&mut self) {
        // Two references left means the table's and ours: nobody else holds
        // or waits on this entry.
        self.locks.remove_if(&self.chat_id, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

/// Exclusive access to one chat. Released on drop.
pub struct ChatGuard {
    // Field order matters: the mutex is released before the ticket drops.
    _guard: OwnedMutexGuard<()>,
    _ticket: LockTicket,
}

/// Applies appends and replaces one at a time per chat, then notifies watchers.
#[derive(Clone)]
pub struct MutationCoordinator {
    store: Arc<dyn ChatStore>,
    locks: ChatLocks,
    dispatcher: NotificationDispatcher,
}

impl MutationCoordinator {
    pub fn new(store: Arc<dyn ChatStore>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            store,
            locks: ChatLocks::new(),
            dispatcher,
        }
    }

    pub fn locks(&self) -> &ChatLocks {
        &self.locks
    }

    /// Append one message to an existing chat.
    ///
    /// Fails with `NotFound` if the chat does not exist; append never creates.
    pub async fn append_message(&self, chat_id: &str, message: ChatMessage) -> Result<Arc<Chat>> {
        validate_chat_id(chat_id)?;
        let _guard = self.locks.lock(chat_id).await;

        let mut chat = self.store.load(chat_id).await?;
        chat.messages.push(message);
        self.store.save(chat_id, &chat).await?;

        let chat = Arc::new(chat);
        // Still under the guard so dispatch order follows persist order.
        let notified = self.dispatcher.notify(chat_id, chat.clone());
        info!(
            "Appended message to chat {} ({} messages, {} watchers notified)",
            chat_id,
            chat.messages.len(),
            notified
        );
        Ok(chat)
    }

    /// Create or overwrite a whole chat.
    pub async fn replace_document(&self, chat_id: &str, chat: Chat) -> Result<Arc<Chat>> {
        validate_chat_id(chat_id)?;
        let _guard = self.locks.lock(chat_id).await;

        let chat = chat.with_id(chat_id);
        self.store.save(chat_id, &chat).await?;

        let chat = Arc::new(chat);
        let notified = self.dispatcher.notify(chat_id, chat.clone());
        info!(
            "Replaced chat {} ({} messages, {} watchers notified)",
            chat_id,
            chat.messages.len(),
            notified
        );
        Ok(chat)
    }
}
