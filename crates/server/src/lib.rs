//! Chatlog Server Library
//!
//! Chats stored as JSON files, appended to one writer at a time per chat,
//! with one-shot long-poll watches for the next change.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod mutation;
pub mod service;
pub mod store;
pub mod watch;

use anyhow::Context;
use axum::{routing::get, Router};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{AppState, ChatServerConfig};
use handlers::{append_message, get_chat, list_chats, replace_chat, watch_chat};
use service::ChatService;
use store::JsonChatStore;

/// Build the HTTP router over a shared chat service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chats", get(list_chats))
        .route(
            "/api/chats/{chat_id}",
            get(get_chat).post(append_message).put(replace_chat),
        )
        // Long-poll: resolves once on the next change
        .route("/api/chats/{chat_id}/update", get(watch_chat))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        // Already set, ignore
    }

    info!("=== Chatlog Server ===");

    let config = ChatServerConfig::from_env()?;
    config
        .ensure_dirs()
        .await
        .context("storage root is unusable")?;
    info!("Data directory: {:?}", config.data_dir);
    info!("Storage directory: {:?}", config.chats_dir);
    info!("Watch timeout: {:?}", config.watch_timeout);

    if let Some(pid_file) = &config.pid_file {
        if let Err(e) = chatlog_common::write_pid_to(pid_file) {
            warn!("Failed to write pid file {:?}: {}", pid_file, e);
        }
    }

    let store = Arc::new(JsonChatStore::new(config.chats_dir.clone()));
    let chats = Arc::new(ChatService::new(store, config.watch_timeout));
    let app = router(AppState {
        chats: chats.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Chatlog server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(chats))
        .await?;

    info!("Chatlog server stopped");
    Ok(())
}

async fn shutdown_signal(chats: Arc<ChatService>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    // Pending long-polls would otherwise hold graceful shutdown open.
    chats.shutdown();
}

async fn health_check() -> &'static str {
    "OK - Chatlog Server"
}
