//! Handlers for aggregate status and the concurrency limit.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Snapshot returned by `GET /api/v1/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub limit: usize,
    pub available_slots: usize,
}

/// Request body for `PUT /api/v1/status/concurrency`.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateConcurrency {
    #[validate(range(min = 1, message = "Limit must be at least 1"))]
    pub limit: usize,
}

async fn snapshot(state: &AppState) -> StatusResponse {
    let stats = state.repo.stats().await;
    StatusResponse {
        pending: stats.pending,
        running: stats.running,
        completed: stats.completed,
        failed: stats.failed,
        total: stats.total(),
        limit: state.gate.limit(),
        available_slots: state.gate.available_slots(),
    }
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: snapshot(&state).await,
    }))
}

/// PUT /api/v1/status/concurrency
///
/// Change the concurrency limit. Lowering it never interrupts running
/// jobs; raising it admits waiting jobs right away.
pub async fn update_concurrency(
    State(state): State<AppState>,
    Json(input): Json<UpdateConcurrency>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.gate.set_limit(input.limit);
    state.dispatcher.wake();

    Ok(Json(DataResponse {
        data: snapshot(&state).await,
    }))
}
