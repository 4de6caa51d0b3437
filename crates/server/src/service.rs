//! The chat service: the one value request handlers talk to.

use crate::error::{ChatError, Result};
use crate::models::{Chat, ChatMessage, WatchOutcome};
use crate::mutation::MutationCoordinator;
use crate::store::{validate_chat_id, ChatStore};
use crate::watch::{NotificationDispatcher, WatchRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Owns the store, the mutation guards and the watch tables.
///
/// Build one at startup and share it behind an `Arc`. Calling
/// [`ChatService::shutdown`] releases every pending watch.
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    coordinator: MutationCoordinator,
    registry: WatchRegistry,
    watch_timeout: Duration,
    shutdown: CancellationToken,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, watch_timeout: Duration) -> Self {
        let registry = WatchRegistry::new();
        let dispatcher = NotificationDispatcher::new(registry.clone());
        Self {
            coordinator: MutationCoordinator::new(store.clone(), dispatcher),
            store,
            registry,
            watch_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        self.store.list().await
    }

    pub async fn get(&self, chat_id: &str) -> Result<Chat> {
        self.store.load(chat_id).await
    }

    pub async fn append(&self, chat_id: &str, message: ChatMessage) -> Result<Arc<Chat>> {
        self.coordinator.append_message(chat_id, message).await
    }

    pub async fn replace(&self, chat_id: &str, chat: Chat) -> Result<Arc<Chat>> {
        self.coordinator.replace_document(chat_id, chat).await
    }

    /// Wait for the next change to `chat_id`, up to the configured maximum.
    pub async fn watch(&self, chat_id: &str) -> Result<WatchOutcome> {
        self.watch_with_timeout(chat_id, self.watch_timeout).await
    }

    pub async fn watch_with_timeout(
        &self,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<WatchOutcome> {
        self.watch_until_cancelled(chat_id, timeout, CancellationToken::new())
            .await
    }

    /// Wait for the next change to `chat_id`.
    ///
    /// Resolves to `Updated` on delivery, `Cancelled` when `cancel` fires or
    /// the service shuts down, and fails with `Timeout` once `timeout` has
    /// elapsed. Dropping the future unregisters the watch.
    pub async fn watch_until_cancelled(
        &self,
        chat_id: &str,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<WatchOutcome> {
        validate_chat_id(chat_id)?;
        let subscription = self.registry.subscribe(chat_id);
        let subscription_id = subscription.id();
        debug!(chat_id, %subscription_id, ?timeout, "Watching chat");

        tokio::select! {
            biased;
            delivered = subscription => match delivered {
                Some(chat) => Ok(WatchOutcome::Updated(chat)),
                None => Ok(WatchOutcome::Cancelled),
            },
            _ = cancel.cancelled() => {
                debug!(chat_id, %subscription_id, "Watch cancelled by caller");
                Ok(WatchOutcome::Cancelled)
            }
            _ = self.shutdown.cancelled() => Ok(WatchOutcome::Cancelled),
            _ = tokio::time::sleep(timeout) => {
                debug!(chat_id, %subscription_id, "Watch timed out");
                Err(ChatError::Timeout)
            }
        }
    }

    /// Resolve every pending and future watch as cancelled.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(
                "Shutting down chat service ({} chats watched)",
                self.registry.watched_chats()
            );
            self.shutdown.cancel();
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    pub fn watch_timeout(&self) -> Duration {
        self.watch_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonChatStore;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> Arc<ChatService> {
        Arc::new(ChatService::new(
            Arc::new(JsonChatStore::new(dir.path())),
            Duration::from_millis(200),
        ))
    }

    async fn wait_for_watchers(service: &ChatService, chat_id: &str, n: usize) {
        while service.registry().pending(chat_id) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_watch_times_out_without_changes() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let err = service
            .watch_with_timeout("c2", Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Timeout));
        assert_eq!(service.registry().watched_chats(), 0);
    }

    #[tokio::test]
    async fn test_caller_cancel_resolves_cancelled() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let cancel = CancellationToken::new();

        let watcher = {
            let service = service.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                service
                    .watch_until_cancelled("c1", Duration::from_secs(5), cancel)
                    .await
            })
        };
        wait_for_watchers(&service, "c1", 1).await;
        cancel.cancel();

        let outcome = watcher.await.unwrap().unwrap();
        assert!(matches!(outcome, WatchOutcome::Cancelled));
        assert_eq!(service.registry().watched_chats(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_watches() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let watcher = {
            let service = service.clone();
            tokio::spawn(async move { service.watch_with_timeout("c1", Duration::from_secs(5)).await })
        };
        wait_for_watchers(&service, "c1", 1).await;
        service.shutdown();

        let outcome = watcher.await.unwrap().unwrap();
        assert!(outcome.into_chat().is_none());
    }

    #[tokio::test]
    async fn test_watch_rejects_invalid_id() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let err = service.watch("../etc").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_get_returns_snapshot_with_id() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.replace("c1", Chat::new("", "T")).await.unwrap();

        let chat = service.get("c1").await.unwrap();
        assert_eq!(chat.id, "c1");
        assert_eq!(chat.title, "T");
        assert_eq!(service.list().await.unwrap(), vec!["c1"]);
    }
}
