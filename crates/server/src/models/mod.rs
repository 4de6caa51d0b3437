use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// A chat: a titled, append-only log of messages.
///
/// The id is the storage key and is never written into the record itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Chat {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<ChatMessage>,
}

impl Chat {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
        }
    }

    /// Same record under a different storage key
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A single chat message. `sent_at` is supplied by the sender and stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: String,
    pub text: String,
    #[serde(rename = "sentAt")]
    pub sent_at: String,
}

impl ChatMessage {
    pub fn new(
        from: impl Into<String>,
        text: impl Into<String>,
        sent_at: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            sent_at: sent_at.into(),
        }
    }
}

/// How a watch ended when it did not time out
#[derive(Debug, Clone)]
pub enum WatchOutcome {
    /// The chat changed; this is its state as of delivery.
    Updated(Arc<Chat>),
    /// The watch was cancelled before any change arrived.
    Cancelled,
}

impl WatchOutcome {
    pub fn into_chat(self) -> Option<Arc<Chat>> {
        match self {
            WatchOutcome::Updated(chat) => Some(chat),
            WatchOutcome::Cancelled => None,
        }
    }
}

// Records written by older writers may carry `"messages": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ChatMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ChatMessage>>::deserialize(deserializer)?.unwrap_or_default())
}
