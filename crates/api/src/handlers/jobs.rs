//! Handlers for the `/jobs` resource.
//!
//! Submission never waits on the concurrency limit: new jobs are queued as
//! `pending` and the dispatcher is woken to admit them.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use gauntlet_core::error::CoreError;
use gauntlet_core::types::JobId;
use gauntlet_events::{JobEvent, SubscriptionGuard};
use gauntlet_store::models::{Job, JobStatus};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Interval between SSE keep-alive comments.
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Request body for `POST /api/v1/jobs`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobs {
    #[validate(length(min = 1, message = "At least one input is required"))]
    pub inputs: Vec<String>,
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_job(state: &AppState, job_id: JobId) -> AppResult<Job> {
    state
        .repo
        .get(job_id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        }))
}

fn sse_event(event: &JobEvent) -> Event {
    Event::default().event(event.kind()).data(event.to_json())
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create one pending job per input. Returns 201 with the created jobs,
/// including their ids and output directories. The whole batch is
/// rejected with 400 if it is empty or any input is blank.
pub async fn submit_jobs(
    State(state): State<AppState>,
    Json(input): Json<SubmitJobs>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let inputs: Vec<String> = input.inputs.iter().map(|s| s.trim().to_string()).collect();
    if let Some(index) = inputs.iter().position(String::is_empty) {
        return Err(AppError::BadRequest(format!(
            "Input at index {index} must not be blank"
        )));
    }

    let jobs = state.repo.submit(&inputs).await;
    tracing::info!(count = jobs.len(), "Jobs submitted");

    state.dispatcher.wake();
    state
        .event_bus
        .publish(JobEvent::StatsUpdate(state.repo.stats().await));

    Ok((StatusCode::CREATED, Json(DataResponse { data: jobs })))
}

// ---------------------------------------------------------------------------
// List / Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// List jobs in submission order, optionally filtered by `?status=`.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let status = match params.status.as_deref() {
        None => None,
        Some(name) => Some(JobStatus::from_name(name).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown job status '{name}'"))
        })?),
    };

    let jobs = state.repo.list(status).await;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Events (SSE)
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/events
///
/// Server-sent event stream for one job. The first event is `connected`;
/// the stream ends after the job's terminal event. For a job that has
/// already finished, the terminal event is sent straight after the
/// acknowledgement. A client too slow to keep up misses intermediate
/// events but still receives the terminal one.
pub async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Subscribe before reading the job so a terminal event published in
    // between is still queued for us.
    let subscriber = state.event_bus.subscribe_filtered(job_id);
    let guard = SubscriptionGuard::new(Arc::clone(&state.event_bus), subscriber.id());
    let job = find_job(&state, job_id).await?;

    let mut head = vec![Arc::new(JobEvent::Connected { job_id })];
    let live = match JobEvent::terminal(&job) {
        Some(terminal) => {
            head.push(Arc::new(terminal));
            None
        }
        None => Some((subscriber, guard)),
    };
    tracing::debug!(%job_id, live = live.is_some(), "Job event stream opened");

    let repo = Arc::clone(&state.repo);
    let bus = Arc::clone(&state.event_bus);
    let tail = stream::unfold(live, move |live| {
        let repo = Arc::clone(&repo);
        let bus = Arc::clone(&bus);
        async move {
            let (mut subscriber, mut guard) = live?;
            loop {
                if let Some(event) = subscriber.recv().await {
                    let next = (!event.is_terminal()).then_some((subscriber, guard));
                    return Some((event, next));
                }

                // The bus closed our queue after it overflowed. Resubscribe
                // first, then read the job so its terminal event is not lost.
                subscriber = bus.subscribe_filtered(job_id);
                guard = SubscriptionGuard::new(Arc::clone(&bus), subscriber.id());
                let job = repo.get(job_id).await?;
                tracing::debug!(%job_id, status = job.status.name(), "Job event stream resynced");
                if let Some(terminal) = JobEvent::terminal(&job) {
                    return Some((Arc::new(terminal), None));
                }
            }
        }
    });

    let events = stream::iter(head)
        .chain(tail)
        .take_until(state.shutdown.cancelled_owned())
        .map(|event| Ok(sse_event(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE)))
}
