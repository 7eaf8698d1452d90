//! Progress relay between task executors and the event bus.
//!
//! Translates [`TaskUpdate`]s reported by an executor into [`JobEvent`]s
//! tagged with the job id and publishes them immediately.

use std::sync::Arc;

use chrono::Utc;
use gauntlet_core::types::JobId;
use gauntlet_events::{EventBus, JobEvent};
use gauntlet_pipeline::{ProgressReporter, TaskUpdate};

/// Map one executor update onto the wire event for `job_id`.
pub fn event_for_update(job_id: JobId, update: TaskUpdate) -> JobEvent {
    let timestamp = Utc::now();
    match update {
        TaskUpdate::Log { level, message } => JobEvent::Log {
            job_id,
            level,
            message,
            timestamp,
        },
        TaskUpdate::Progress {
            step,
            total,
            message,
        } => JobEvent::Progress {
            job_id,
            step,
            total,
            message,
            timestamp,
        },
        TaskUpdate::Screenshot { path, step } => JobEvent::Screenshot {
            job_id,
            path,
            step,
            timestamp,
        },
    }
}

/// Build the reporter handed to the executor for `job_id`.
pub fn reporter_for(job_id: JobId, bus: Arc<EventBus>) -> ProgressReporter {
    ProgressReporter::new(move |update| {
        bus.publish(event_for_update(job_id, update));
    })
}
