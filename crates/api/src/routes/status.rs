use axum::routing::{get, put};
use axum::Router;

use crate::handlers::status;
use crate::state::AppState;

/// Routes mounted at `/status`.
///
/// ```text
/// GET    /                -> get_status
/// PUT    /concurrency     -> update_concurrency
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(status::get_status))
        .route("/concurrency", put(status::update_concurrency))
}
