//! Durable storage for terminal job records.
//!
//! Every job owns one directory under the output root. Once the job
//! reaches a terminal state, [`ResultStore::persist`] writes a
//! `result.json` record next to the artifacts the task produced. History
//! queries rebuild the list of finished jobs by scanning those records,
//! so they survive process restarts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use gauntlet_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::models::{Job, JobStatus};

/// File name of the metadata record inside a job directory.
pub const RECORD_FILE_NAME: &str = "result.json";

/// Scratch name used while a record is being written.
const RECORD_TMP_FILE_NAME: &str = "result.json.tmp";

/// Errors raised while reading or writing result records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Metadata persisted for one finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub job_id: JobId,
    pub input: String,
    pub status: JobStatus,
    pub output_dir: PathBuf,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub duration_ms: Option<i64>,
    pub summary: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Files produced by the task, relative to `output_dir`.
    pub artifacts: Vec<String>,
}

impl ResultRecord {
    pub fn from_job(job: &Job, artifacts: Vec<String>) -> Self {
        Self {
            job_id: job.id,
            input: job.input.clone(),
            status: job.status,
            output_dir: job.output_dir.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            duration_ms: job.duration_ms(),
            summary: job.result_summary.clone(),
            error: job.error.clone(),
            artifacts,
        }
    }
}

/// Filesystem-backed result store rooted at the output directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the output root if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Create the job's own output directory.
    pub async fn prepare_job_dir(&self, job: &Job) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&job.output_dir).await?;
        Ok(())
    }

    /// Write the job's record into its output directory.
    ///
    /// The record is written to a scratch file and renamed into place, so
    /// readers never observe a half-written `result.json`.
    pub async fn persist(&self, job: &Job) -> Result<ResultRecord, StoreError> {
        tokio::fs::create_dir_all(&job.output_dir).await?;

        let artifacts = collect_artifacts(&job.output_dir).await?;
        let record = ResultRecord::from_job(job, artifacts);
        let bytes = serde_json::to_vec_pretty(&record)?;

        let tmp_path = job.output_dir.join(RECORD_TMP_FILE_NAME);
        let final_path = job.output_dir.join(RECORD_FILE_NAME);
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        tracing::debug!(
            job_id = %job.id,
            path = %final_path.display(),
            artifacts = record.artifacts.len(),
            "Result record written",
        );

        Ok(record)
    }

    /// Every readable record under the root, most recently finished first.
    ///
    /// Directories without a record (jobs still running, or whose record
    /// failed to persist) are skipped, as are records that do not parse.
    pub async fn list_completed(&self) -> Result<Vec<ResultRecord>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let path = entry.path().join(RECORD_FILE_NAME);
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unreadable result record");
                    continue;
                }
            };

            match serde_json::from_slice::<ResultRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Malformed result record");
                }
            }
        }

        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(records)
    }
}

/// List files under `dir`, relative to it, excluding the result record.
pub async fn collect_artifacts(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut artifacts = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }

            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            if current == dir
                && (relative == Path::new(RECORD_FILE_NAME)
                    || relative == Path::new(RECORD_TMP_FILE_NAME))
            {
                continue;
            }
            artifacts.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }

    artifacts.sort();
    Ok(artifacts)
}
