//! Job entity and aggregate counts.

use std::path::PathBuf;

use gauntlet_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};

use super::status::JobStatus;

/// One unit of submitted work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    /// Task descriptor supplied by the caller, usually a URL.
    pub input: String,
    pub status: JobStatus,
    /// Directory that receives the job's artifacts and result record.
    pub output_dir: PathBuf,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Set when the job completes.
    pub result_summary: Option<serde_json::Value>,
    /// Set when the job fails.
    pub error: Option<String>,
}

impl Job {
    /// Wall-clock run time, once the job has both started and finished.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobStats {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }

    pub(crate) fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}
