//! JSON-based chat storage
//!
//! One `<chat_id>.json` file per chat. Saves go to a uniquely named temp file
//! that is synced and then renamed over the record.

use super::{validate_chat_id, ChatStore};
use crate::error::{ChatError, Result};
use crate::models::Chat;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

const RECORD_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";

/// JSON file chat store rooted at a single directory
#[derive(Clone, Debug)]
pub struct JsonChatStore {
    dir: PathBuf,
}

impl JsonChatStore {
    /// Create a store over `dir`. The directory is not created here; a
    /// missing directory simply lists as empty.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the storage path for a chat
    fn chat_path(&self, chat_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", chat_id, RECORD_EXT))
    }

    fn temp_path(&self, chat_id: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.{}", chat_id, Uuid::new_v4().simple(), TEMP_EXT))
    }
}

#[async_trait]
impl ChatStore for JsonChatStore {
    async fn load(&self, chat_id: &str) -> Result<Chat> {
        validate_chat_id(chat_id)?;
        let path = self.chat_path(chat_id);

        let content = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ChatError::NotFound(chat_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let chat: Chat = serde_json::from_slice(&content)
            .map_err(|e| ChatError::Malformed(format!("chat {}: {}", chat_id, e)))?;

        Ok(chat.with_id(chat_id))
    }

    async fn save(&self, chat_id: &str, chat: &Chat) -> Result<()> {
        validate_chat_id(chat_id)?;
        fs::create_dir_all(&self.dir).await?;

        let path = self.chat_path(chat_id);
        let temp_path = self.temp_path(chat_id);
        let json = serde_json::to_vec_pretty(chat)?;

        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            drop(file);
            // Atomic rename
            fs::rename(&temp_path, &path).await
        };

        if let Err(e) = write.await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove temp file {:?}: {}", temp_path, cleanup);
                }
            }
            return Err(e.into());
        }

        debug!(
            "Saved chat {} ({} messages) to {:?}",
            chat_id,
            chat.messages.len(),
            path
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_chat_id(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;
    use tempfile::TempDir;

    fn sample_chat(id: &str) -> Chat {
        let mut chat = Chat::new(id, "Standup");
        chat.messages.push(ChatMessage::new("alice", "hi", "t1"));
        chat.messages.push(ChatMessage::new("bob", "yo", "t2"));
        chat
    }

    #[tokio::test]
    async fn test_save_then_load_returns_same_chat() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonChatStore::new(temp_dir.path().join("chats"));

        let chat = sample_chat("c1");
        store.save("c1", &chat).await.unwrap();

        let loaded = store.load("c1").await.unwrap();
        assert_eq!(loaded, chat);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonChatStore::new(temp_dir.path());

        let err = store.load("nope").await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_load_corrupt_record_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonChatStore::new(temp_dir.path());
        std::fs::write(temp_dir.path().join("bad.json"), "{ malformed json ...").unwrap();

        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, ChatError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_list_missing_namespace_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonChatStore::new(temp_dir.path().join("does-not-exist"));

        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_ignores_temp_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonChatStore::new(temp_dir.path());

        store.save("b", &Chat::new("b", "B")).await.unwrap();
        store.save("a", &Chat::new("a", "A")).await.unwrap();
        std::fs::write(temp_dir.path().join(".a.deadbeef.tmp"), "{").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(temp_dir.path().join("dir.json")).unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_save_overwrites_and_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonChatStore::new(temp_dir.path());

        store.save("c1", &sample_chat("c1")).await.unwrap();
        store.save("c1", &Chat::new("c1", "Renamed")).await.unwrap();

        let loaded = store.load("c1").await.unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert!(loaded.messages.is_empty());

        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["c1.json"]);
    }

    #[tokio::test]
    async fn test_invalid_id_never_touches_disk() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonChatStore::new(temp_dir.path());

        let err = store.save("../escape", &Chat::default()).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidId(_)));
        assert!(!temp_dir.path().join("../escape.json").exists());
    }
}
