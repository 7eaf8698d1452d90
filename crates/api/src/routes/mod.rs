pub mod health;
pub mod history;
pub mod jobs;
pub mod status;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree for request/response endpoints.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                      list, submit
/// /jobs/{id}                 get
/// /status                    aggregate counts and concurrency
/// /status/concurrency        change the limit (PUT)
/// /history                   persisted result records
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/status", status::router())
        .nest("/history", history::router())
}

/// Long-lived streaming endpoints, with full paths.
///
/// ```text
/// /api/v1/ws                 broadcast WebSocket
/// /api/v1/jobs/{id}/events   per-job server-sent events
/// ```
pub fn streaming_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/ws", get(ws::ws_handler))
        .route("/api/v1/jobs/{id}/events", get(handlers::jobs::job_events))
}
