//! HTTP handlers for the chat API
//!
//! Thin glue over [`crate::service::ChatService`]; all state lives there.

pub mod chat;
pub mod watch;

// Re-export AppState from config
pub use crate::config::AppState;

pub use chat::{append_message, get_chat, list_chats, replace_chat};
pub use watch::watch_chat;
