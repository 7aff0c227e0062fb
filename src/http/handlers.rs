//! Busy-state handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::coordinator::BusySnapshot;
use crate::http::server::AppState;

/// State of a single named key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStatus {
    pub key: String,
    pub active: bool,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_status(State(state): State<AppState>) -> Json<BusySnapshot> {
    Json(state.coordinator.snapshot())
}

pub async fn get_key(State(state): State<AppState>, Path(key): Path<String>) -> Json<KeyStatus> {
    let active = state.coordinator.state().get_for(&key);
    Json(KeyStatus { key, active })
}

pub async fn set_key(State(state): State<AppState>, Path(key): Path<String>) -> Json<KeyStatus> {
    state.coordinator.state().set_for(&key, true);
    Json(KeyStatus { key, active: true })
}

pub async fn unset_key(State(state): State<AppState>, Path(key): Path<String>) -> Json<KeyStatus> {
    state.coordinator.state().set_for(&key, false);
    Json(KeyStatus { key, active: false })
}

pub async fn clear_keys(State(state): State<AppState>) -> StatusCode {
    state.coordinator.state().clear_all();
    StatusCode::NO_CONTENT
}
