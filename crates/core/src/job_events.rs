//! Wire names for job lifecycle and progress events.
//!
//! Every message pushed to a WebSocket or SSE subscriber carries one of
//! these values in its `type` field.

/// Acknowledgement sent first on a filtered (per-job) stream.
pub const MSG_TYPE_CONNECTED: &str = "connected";

/// Job admitted and handed to the task executor.
pub const MSG_TYPE_JOB_STARTED: &str = "job-started";

/// Free-form log line emitted by the task executor.
pub const MSG_TYPE_LOG: &str = "log";

/// Step counter update emitted by the task executor.
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// Screenshot (or similar artifact) written to the job's output directory.
pub const MSG_TYPE_SCREENSHOT: &str = "screenshot";

/// Job completed successfully.
pub const MSG_TYPE_JOB_COMPLETED: &str = "job-completed";

/// Job failed with an error.
pub const MSG_TYPE_JOB_FAILED: &str = "job-failed";

/// Aggregate job counts. Never bound to a single job.
pub const MSG_TYPE_STATS_UPDATE: &str = "stats-update";

/// Severity of a task log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}
