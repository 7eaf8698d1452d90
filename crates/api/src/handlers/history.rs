use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/history
///
/// Persisted result records, most recently completed first.
pub async fn list_history(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let records = state.results.list_completed().await?;
    Ok(Json(DataResponse { data: records }))
}
