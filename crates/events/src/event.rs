//! Job lifecycle and progress events.
//!
//! Serialized as `{ "type": "<kind>", "data": { ... } }` with camelCase
//! payload fields. Every variant except [`JobEvent::StatsUpdate`] carries
//! the `jobId` it belongs to.

use std::path::PathBuf;

use chrono::Utc;
use gauntlet_core::job_events::{
    MSG_TYPE_CONNECTED, MSG_TYPE_JOB_COMPLETED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_STARTED,
    MSG_TYPE_LOG, MSG_TYPE_PROGRESS, MSG_TYPE_SCREENSHOT, MSG_TYPE_STATS_UPDATE,
};
pub use gauntlet_core::job_events::LogLevel;
use gauntlet_core::types::{JobId, Timestamp};
use gauntlet_store::models::{Job, JobStats};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum JobEvent {
    /// First message on a per-job stream.
    Connected { job_id: JobId },

    JobStarted {
        job_id: JobId,
        input: String,
        output_dir: PathBuf,
        started_at: Timestamp,
    },

    Log {
        job_id: JobId,
        level: LogLevel,
        message: String,
        timestamp: Timestamp,
    },

    Progress {
        job_id: JobId,
        step: u32,
        total: Option<u32>,
        message: Option<String>,
        timestamp: Timestamp,
    },

    Screenshot {
        job_id: JobId,
        /// Path relative to the job's output directory.
        path: String,
        step: Option<u32>,
        timestamp: Timestamp,
    },

    JobCompleted {
        job_id: JobId,
        summary: serde_json::Value,
        duration_ms: Option<i64>,
    },

    JobFailed {
        job_id: JobId,
        error: String,
        duration_ms: Option<i64>,
    },

    StatsUpdate(JobStats),
}

impl JobEvent {
    /// Build the `job-started` event for a job that was just admitted.
    pub fn started(job: &Job) -> Self {
        Self::JobStarted {
            job_id: job.id,
            input: job.input.clone(),
            output_dir: job.output_dir.clone(),
            started_at: job.started_at.unwrap_or_else(Utc::now),
        }
    }

    /// Build the terminal event matching a finished job's outcome.
    ///
    /// Returns `None` while the job is still pending or running.
    pub fn terminal(job: &Job) -> Option<Self> {
        if !job.status.is_terminal() {
            return None;
        }
        Some(match &job.error {
            Some(error) => Self::JobFailed {
                job_id: job.id,
                error: error.clone(),
                duration_ms: job.duration_ms(),
            },
            None => Self::JobCompleted {
                job_id: job.id,
                summary: job
                    .result_summary
                    .clone()
                    .unwrap_or(serde_json::Value::Null),
                duration_ms: job.duration_ms(),
            },
        })
    }

    /// The wire `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => MSG_TYPE_CONNECTED,
            Self::JobStarted { .. } => MSG_TYPE_JOB_STARTED,
            Self::Log { .. } => MSG_TYPE_LOG,
            Self::Progress { .. } => MSG_TYPE_PROGRESS,
            Self::Screenshot { .. } => MSG_TYPE_SCREENSHOT,
            Self::JobCompleted { .. } => MSG_TYPE_JOB_COMPLETED,
            Self::JobFailed { .. } => MSG_TYPE_JOB_FAILED,
            Self::StatsUpdate(_) => MSG_TYPE_STATS_UPDATE,
        }
    }

    /// The job this event belongs to; `None` for process-wide events.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Connected { job_id }
            | Self::JobStarted { job_id, .. }
            | Self::Log { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::Screenshot { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobFailed { job_id, .. } => Some(*job_id),
            Self::StatsUpdate(_) => None,
        }
    }

    /// Whether this event ends its job's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobCompleted { .. } | Self::JobFailed { .. })
    }

    /// JSON text for a WebSocket frame or SSE `data:` line.
    pub fn to_json(&self) -> String {
        // Serializing this enum cannot fail: every field is a plain value.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
