//! HTTP endpoints around the live rooms

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Passphrase, RoomInfo, Stats};
use crate::AppState;

pub async fn health() -> &'static str {
    "ok"
}

/// Current state of a live room
pub async fn room_info(
    Path(passphrase): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RoomInfo>> {
    state
        .registry
        .get(&passphrase)
        .map(|room| Json(room.info()))
        .ok_or_else(|| AppError::NotFound("No active room for this passphrase".to_string()))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<Stats> {
    Json(state.registry.stats())
}

#[derive(Debug, Serialize)]
pub struct NewPassphrase {
    pub passphrase: Passphrase,
}

/// Suggest a random passphrase. The room appears once someone joins it.
pub async fn new_passphrase() -> Json<NewPassphrase> {
    Json(NewPassphrase {
        passphrase: Passphrase::generate(),
    })
}
