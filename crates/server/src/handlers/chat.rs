//! Chat read and mutation handlers
//!
//! Request bodies are parsed as JSON whatever their content type, since the
//! browser client posts without one.

use crate::{
    config::AppState,
    error::{ChatError, Result},
    models::{Chat, ChatMessage},
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info};

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ChatError::Malformed(format!("request body: {}", e)))
}

fn log_failure(route: &str, chat_id: &str, err: &ChatError) {
    match err {
        ChatError::Io(_) => error!("{} /api/chats/{} failed: {}", route, chat_id, err),
        _ => info!("{} /api/chats/{} rejected: {}", route, chat_id, err),
    }
}

/// GET /api/chats
pub async fn list_chats(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    info!("GET /api/chats");
    let ids = state.chats.list().await.map_err(|e| {
        error!("Failed to list chats: {}", e);
        e
    })?;
    Ok(Json(ids))
}

/// GET /api/chats/{chat_id}
pub async fn get_chat(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Chat>> {
    info!("GET /api/chats/{}", chat_id);
    let chat = state.chats.get(&chat_id).await.map_err(|e| {
        log_failure("GET", &chat_id, &e);
        e
    })?;
    Ok(Json(chat))
}

/// POST /api/chats/{chat_id}
///
/// Appends one `{from, text, sentAt}` message and returns the updated chat.
pub async fn append_message(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Arc<Chat>>> {
    info!("POST /api/chats/{}", chat_id);
    let result = async {
        let message: ChatMessage = parse_body(&body)?;
        state.chats.append(&chat_id, message).await
    }
    .await;

    let chat = result.map_err(|e| {
        log_failure("POST", &chat_id, &e);
        e
    })?;
    Ok(Json(chat))
}

/// PUT /api/chats/{chat_id}
///
/// Creates or overwrites the whole chat.
pub async fn replace_chat(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Arc<Chat>>> {
    info!("PUT /api/chats/{}", chat_id);
    let result = async {
        let chat: Chat = parse_body(&body)?;
        state.chats.replace(&chat_id, chat).await
    }
    .await;

    let chat = result.map_err(|e| {
        log_failure("PUT", &chat_id, &e);
        e
    })?;
    Ok(Json(chat))
}
