//! Data directory layout and process helpers for the chatlog server
//!
//! Directory layout:
//! ```text
//! $DATA_DIR/
//! └── chats/           # One <chat_id>.json record per chat
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the storage root. Required.
pub const DATA_DIR_VAR: &str = "DATA_DIR";

/// Environment variable naming an optional PID file.
pub const PID_FILE_VAR: &str = "PID_FILE";

/// Read the DATA_DIR root from the environment.
///
/// There is no fallback: a server without a storage root cannot do anything
/// useful, so a missing or empty variable is an error.
pub fn data_root() -> anyhow::Result<PathBuf> {
    match std::env::var(DATA_DIR_VAR) {
        Ok(val) if !val.trim().is_empty() => Ok(PathBuf::from(val)),
        _ => anyhow::bail!("{} must be set to the storage root", DATA_DIR_VAR),
    }
}

/// Chat records directory under a root
pub fn chats_dir(root: &Path) -> PathBuf {
    root.join("chats")
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Write the current process id to an explicit path
pub fn write_pid_to(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    fs::write(path, std::process::id().to_string())?;
    info!("Wrote pid {} to {:?}", std::process::id(), path);
    Ok(())
}
