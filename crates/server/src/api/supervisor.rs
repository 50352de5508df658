//! Worker supervisor handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use genjobs_core::{EnsureRunning, SupervisorStatus};

use super::{internal_error, ApiError};
use crate::state::AppState;

/// Start the worker process unless it is already running.
pub async fn start_worker(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EnsureRunning>, ApiError> {
    state
        .supervisor()
        .ensure_running()
        .await
        .map(Json)
        .map_err(internal_error)
}

pub async fn worker_status(State(state): State<Arc<AppState>>) -> Json<SupervisorStatus> {
    Json(state.supervisor().status().await)
}
