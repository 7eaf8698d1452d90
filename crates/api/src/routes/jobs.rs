//! Route definitions for the `/jobs` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> submit_jobs
/// GET    /{id}            -> get_job
/// ```
///
/// `/{id}/events` is served from [`super::streaming_routes`].
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::submit_jobs))
        .route("/{id}", get(jobs::get_job))
}
