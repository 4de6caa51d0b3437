//! Error types for chat storage, mutation and watch operations.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::io;
use thiserror::Error;

/// Result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors surfaced by the store, the mutation coordinator and watches.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChatError {
    #[error("chat not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed chat data: {0}")]
    Malformed(String),

    #[error("invalid chat id: {0:?}")]
    InvalidId(String),

    #[error("watch timed out before the chat changed")]
    Timeout,
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Malformed(err.to_string())
    }
}

impl ChatError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Malformed(_) | ChatError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ChatError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ChatError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}
