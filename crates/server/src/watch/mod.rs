//! One-shot change watches for chats
//!
//! A watch asks to be told about the *next* change to one chat. It resolves
//! at most once and is then gone.
//!
//! # Architecture
//!
//! ```text
//! watch request:
//!   WatchRegistry::subscribe(chat_id) -> Subscription (pending oneshot slot)
//!                                              ↑
//! mutation path (guard held):                  │ send(Arc<Chat>)
//!   save() -> NotificationDispatcher::notify() ┘
//!                └─> WatchRegistry::drain(chat_id)  [snapshot-and-clear]
//! ```
//!
//! Subscriptions unregister themselves when dropped, so a client that goes
//! away (its request future is dropped) leaves nothing behind.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::NotificationDispatcher;
pub use registry::{Subscription, WatchRegistry};
