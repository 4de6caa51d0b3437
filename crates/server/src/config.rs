//! Chat server configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::service::ChatService;

pub const ADDR_VAR: &str = "CHAT_ADDR";
pub const WATCH_TIMEOUT_VAR: &str = "WATCH_TIMEOUT_SECS";

const DEFAULT_ADDR: &str = "0.0.0.0:3005";
const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 30;

/// Configuration for the chat server
#[derive(Clone, Debug)]
pub struct ChatServerConfig {
    /// Storage root (DATA_DIR)
    pub data_dir: PathBuf,
    /// Directory holding one JSON record per chat
    pub chats_dir: PathBuf,
    /// Address the HTTP listener binds to
    pub bind_addr: SocketAddr,
    /// Longest a single watch may wait before answering "no update yet"
    pub watch_timeout: Duration,
    /// Where to write the process id, if anywhere
    pub pid_file: Option<PathBuf>,
}

impl ChatServerConfig {
    /// Create config with custom base directory and defaults for the rest
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let data_dir = base_dir.into();
        Self {
            chats_dir: chatlog_common::chats_dir(&data_dir),
            data_dir,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3005)),
            watch_timeout: Duration::from_secs(DEFAULT_WATCH_TIMEOUT_SECS),
            pid_file: None,
        }
    }

    /// Read configuration from the environment.
    ///
    /// `DATA_DIR` is required. `CHAT_ADDR`, `WATCH_TIMEOUT_SECS` and
    /// `PID_FILE` are optional.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::with_base_dir(chatlog_common::data_root()?);

        let addr = std::env::var(ADDR_VAR).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        config.bind_addr = addr
            .parse()
            .with_context(|| format!("{} is not a socket address: {:?}", ADDR_VAR, addr))?;

        if let Ok(secs) = std::env::var(WATCH_TIMEOUT_VAR) {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("{} must be whole seconds: {:?}", WATCH_TIMEOUT_VAR, secs))?;
            anyhow::ensure!(secs > 0, "{} must be greater than zero", WATCH_TIMEOUT_VAR);
            config.watch_timeout = Duration::from_secs(secs);
        }

        config.pid_file = std::env::var(chatlog_common::PID_FILE_VAR)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    /// Ensure the storage directories exist and are usable.
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.chats_dir)
            .await
            .with_context(|| format!("cannot create chat directory {:?}", self.chats_dir))?;
        let meta = tokio::fs::metadata(&self.chats_dir).await?;
        anyhow::ensure!(meta.is_dir(), "{:?} is not a directory", self.chats_dir);
        Ok(())
    }

    pub fn chats_dir(&self) -> &Path {
        &self.chats_dir
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub chats: Arc<ChatService>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_dir_defaults() {
        let config = ChatServerConfig::with_base_dir("/srv/data");
        assert_eq!(config.chats_dir(), Path::new("/srv/data/chats"));
        assert_eq!(config.bind_addr.port(), 3005);
        assert_eq!(config.watch_timeout, Duration::from_secs(30));
        assert!(config.pid_file.is_none());
    }

    #[tokio::test]
    async fn test_ensure_dirs_creates_chats_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatServerConfig::with_base_dir(dir.path());
        config.ensure_dirs().await.unwrap();
        assert!(dir.path().join("chats").is_dir());
    }

    #[tokio::test]
    async fn test_ensure_dirs_fails_on_unusable_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let config = ChatServerConfig::with_base_dir(&file);
        assert!(config.ensure_dirs().await.is_err());
    }
}
