//! Long-poll watch handler

use crate::{
    config::AppState,
    error::{ChatError, Result},
    models::WatchOutcome,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, info};

/// GET /api/chats/{chat_id}/update
///
/// Blocks until the chat next changes and returns it. Answers 408 with an
/// error body when the watch times out, so polling clients see a non-2xx and
/// re-arm, and 503 when the server is shutting down. If the client
/// disconnects, the request future is dropped and the watch goes with it.
pub async fn watch_chat(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    info!("GET /api/chats/{}/update", chat_id);

    match state.chats.watch(&chat_id).await {
        Ok(WatchOutcome::Updated(chat)) => Ok(Json(chat).into_response()),
        Ok(WatchOutcome::Cancelled) => Ok(StatusCode::SERVICE_UNAVAILABLE.into_response()),
        Err(ChatError::Timeout) => {
            debug!("No update for chat {} before timeout", chat_id);
            Err(ChatError::Timeout)
        }
        Err(e) => Err(e),
    }
}
