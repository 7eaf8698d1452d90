//! Task executor interface and shared types.
//!
//! Defines [`TaskExecutor`], the seam between the scheduler and whatever
//! performs the automation, along with [`TaskRequest`], [`TaskOutcome`],
//! [`TaskUpdate`], and [`TaskError`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gauntlet_core::job_events::LogLevel;
use gauntlet_core::types::JobId;

/// Everything an executor needs to run one job.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub job_id: JobId,
    /// Task descriptor supplied at submission, usually a URL.
    pub input: String,
    /// Directory the executor should write its artifacts into. Exists
    /// before `execute` is called.
    pub output_dir: PathBuf,
}

/// Successful result of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    /// Executor-defined result summary, stored verbatim.
    pub summary: serde_json::Value,
}

/// Intermediate progress reported while a task runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    Log {
        level: LogLevel,
        message: String,
    },
    Progress {
        step: u32,
        total: Option<u32>,
        message: Option<String>,
    },
    /// A screenshot (or similar artifact) was written to the output
    /// directory. `path` is relative to it.
    Screenshot { path: String, step: Option<u32> },
}

/// Errors that end a task unsuccessfully.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The executor process could not be started.
    #[error("Failed to start executor: {0}")]
    Spawn(#[source] std::io::Error),

    /// The task exceeded its configured timeout and was killed.
    #[error("Task timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The executor process exited unsuccessfully.
    #[error("Executor exited with code {exit_code}: {stderr}")]
    ExitStatus { exit_code: i32, stderr: String },

    /// The executor reported a failure of the task itself.
    #[error("{0}")]
    Failed(String),

    /// An I/O error while communicating with the executor.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Callback handle through which an executor streams [`TaskUpdate`]s.
///
/// Cheap to clone. Reporting never blocks.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(TaskUpdate) + Send + Sync>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(TaskUpdate) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// A reporter that discards every update.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, update: TaskUpdate) {
        (self.sink)(update);
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.report(TaskUpdate::Log {
            level,
            message: message.into(),
        });
    }

    pub fn progress(&self, step: u32, total: Option<u32>, message: Option<String>) {
        self.report(TaskUpdate::Progress {
            step,
            total,
            message,
        });
    }

    pub fn screenshot(&self, path: impl Into<String>, step: Option<u32>) {
        self.report(TaskUpdate::Screenshot {
            path: path.into(),
            step,
        });
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

/// Performs the long-running work for one job.
///
/// Implementations must be safe to call concurrently for different jobs.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        request: TaskRequest,
        progress: ProgressReporter,
    ) -> Result<TaskOutcome, TaskError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
