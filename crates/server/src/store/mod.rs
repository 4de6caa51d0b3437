//! Chat storage module
//!
//! Provides the [`ChatStore`] abstraction and a JSON file backed
//! implementation using write-then-rename for atomic replacement.

pub mod json_store;

pub use json_store::JsonChatStore;

use crate::error::{ChatError, Result};
use crate::models::Chat;
use async_trait::async_trait;

/// Persistent storage for chat records keyed by chat id.
#[async_trait]
pub trait ChatStore: Send + Sync + 'static {
    /// Load the current record. Fails with `NotFound` when absent.
    async fn load(&self, chat_id: &str) -> Result<Chat>;
    /// Create or overwrite the record. Readers never observe a partial write.
    async fn save(&self, chat_id: &str, chat: &Chat) -> Result<()>;
    /// Known chat ids, sorted. Empty when the namespace does not exist yet.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Longest accepted id in bytes. Leaves room under the usual 255-byte file
/// name limit for the record extension and the temp file affixes.
pub const MAX_CHAT_ID_LEN: usize = 200;

/// Reject ids that cannot be used as a plain file stem.
pub fn validate_chat_id(chat_id: &str) -> Result<()> {
    let bad = chat_id.is_empty()
        || chat_id.len() > MAX_CHAT_ID_LEN
        || chat_id.starts_with('.')
        || chat_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0');
    if bad {
        return Err(ChatError::InvalidId(chat_id.to_string()));
    }
    Ok(())
}
