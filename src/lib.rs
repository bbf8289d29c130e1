//! livepaste server - real-time shared pastes keyed by passphrase

pub mod api;
pub mod config;
pub mod error;
pub mod messages;
pub mod models;
pub mod sync;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::sync::RoomRegistry;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub registry: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let registry = Arc::new(RoomRegistry::new(config.max_content_bytes));
        Arc::new(Self { config, registry })
    }
}

/// Build the router
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/ws/:passphrase", get(websocket::handler))
        .route("/api/rooms/:passphrase", get(api::room_info))
        .route("/api/stats", get(api::stats))
        .route("/api/passphrases", post(api::new_passphrase))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
