//! In-memory repository for submitted jobs.
//!
//! Jobs are kept for the whole process lifetime so that status and history
//! queries can see them. The repository never decides *whether* a job may
//! run; it only answers which pending jobs are next in line and records
//! the transitions the scheduler performs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use chrono::Utc;
use gauntlet_core::naming::{disambiguate, output_dir_name};
use gauntlet_core::types::{new_job_id, JobId, Timestamp};
use tokio::sync::RwLock;

use crate::models::{Job, JobStats, JobStatus};

/// A lifecycle transition that the repository refused to apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Job {0} does not exist")]
    UnknownJob(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

#[derive(Default)]
struct JobTable {
    /// All jobs in submission order.
    jobs: Vec<Job>,
    /// Job id -> position in `jobs`.
    index: HashMap<JobId, usize>,
    /// Positions of pending jobs, oldest first.
    pending: VecDeque<usize>,
    /// Every output directory handed out so far.
    issued_dirs: HashSet<PathBuf>,
}

impl JobTable {
    fn unique_output_dir(&mut self, root: &Path, input: &str, at: Timestamp) -> PathBuf {
        let base = output_dir_name(input, at);
        let mut candidate = root.join(&base);
        let mut attempt = 2;
        while self.issued_dirs.contains(&candidate) {
            candidate = root.join(disambiguate(&base, attempt));
            attempt += 1;
        }
        self.issued_dirs.insert(candidate.clone());
        candidate
    }

    fn transition(
        &mut self,
        id: JobId,
        to: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, TransitionError> {
        let pos = *self.index.get(&id).ok_or(TransitionError::UnknownJob(id))?;
        let job = &mut self.jobs[pos];

        if !job.status.can_transition_to(to) {
            return Err(TransitionError::InvalidTransition {
                id,
                from: job.status,
                to,
            });
        }

        let from = job.status;
        job.status = to;
        apply(job);
        let updated = job.clone();

        if from == JobStatus::Pending {
            self.pending.retain(|&p| p != pos);
        }

        Ok(updated)
    }
}

/// Shared, in-memory job store.
///
/// Designed to be wrapped in `Arc` and shared between HTTP handlers and
/// the scheduler.
pub struct JobRepo {
    output_root: PathBuf,
    table: RwLock<JobTable>,
}

impl JobRepo {
    /// Create an empty repository whose jobs write under `output_root`.
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            table: RwLock::new(JobTable::default()),
        }
    }

    /// Root directory under which every job's output directory is created.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Create one pending job per input, in order.
    ///
    /// All jobs of a batch share one submission timestamp; jobs whose
    /// derived directory name collides get a numeric suffix.
    pub async fn submit(&self, inputs: &[String]) -> Vec<Job> {
        self.submit_at(inputs, Utc::now()).await
    }

    async fn submit_at(&self, inputs: &[String], at: Timestamp) -> Vec<Job> {
        let mut table = self.table.write().await;
        let mut created = Vec::with_capacity(inputs.len());

        for input in inputs {
            let output_dir = table.unique_output_dir(&self.output_root, input, at);
            let job = Job {
                id: new_job_id(),
                input: input.clone(),
                status: JobStatus::Pending,
                output_dir,
                created_at: at,
                started_at: None,
                completed_at: None,
                result_summary: None,
                error: None,
            };

            let pos = table.jobs.len();
            table.index.insert(job.id, pos);
            table.pending.push_back(pos);
            table.jobs.push(job.clone());
            created.push(job);
        }

        created
    }

    /// Up to `max_count` pending jobs, oldest first. Does not mutate.
    pub async fn admission_candidates(&self, max_count: usize) -> Vec<Job> {
        let table = self.table.read().await;
        table
            .pending
            .iter()
            .take(max_count)
            .map(|&pos| table.jobs[pos].clone())
            .collect()
    }

    /// `Pending -> Running`, stamping `started_at`.
    pub async fn mark_running(&self, id: JobId) -> Result<Job, TransitionError> {
        let now = Utc::now();
        self.table
            .write()
            .await
            .transition(id, JobStatus::Running, |job| job.started_at = Some(now))
    }

    /// `Running -> Completed`, stamping `completed_at` and the summary.
    pub async fn mark_completed(
        &self,
        id: JobId,
        summary: serde_json::Value,
    ) -> Result<Job, TransitionError> {
        let now = Utc::now();
        self.table
            .write()
            .await
            .transition(id, JobStatus::Completed, |job| {
                job.completed_at = Some(now);
                job.result_summary = Some(summary);
            })
    }

    /// `Running -> Failed`, stamping `completed_at` and the error.
    pub async fn mark_failed(
        &self,
        id: JobId,
        error: impl Into<String>,
    ) -> Result<Job, TransitionError> {
        let now = Utc::now();
        let error = error.into();
        self.table
            .write()
            .await
            .transition(id, JobStatus::Failed, |job| {
                job.completed_at = Some(now);
                job.error = Some(error);
            })
    }

    /// Find a job by id.
    pub async fn get(&self, id: JobId) -> Option<Job> {
        let table = self.table.read().await;
        table.index.get(&id).map(|&pos| table.jobs[pos].clone())
    }

    /// All jobs in submission order, optionally restricted to one status.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        self.table
            .read()
            .await
            .jobs
            .iter()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect()
    }

    /// Terminal jobs, most recently finished first.
    pub async fn history(&self) -> Vec<Job> {
        let mut done: Vec<Job> = self
            .table
            .read()
            .await
            .jobs
            .iter()
            .filter(|job| job.status.is_terminal())
            .cloned()
            .collect();
        done.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        done
    }

    /// Count jobs per status.
    pub async fn stats(&self) -> JobStats {
        let table = self.table.read().await;
        let mut stats = JobStats::default();
        for job in &table.jobs {
            stats.record(job.status);
        }
        stats
    }

    /// Total number of jobs ever submitted.
    pub async fn len(&self) -> usize {
        self.table.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn inputs(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn submit_creates_pending_jobs_in_order() {
        let repo = JobRepo::new("/out");
        let jobs = repo.submit(&inputs(&["a", "b", "c"])).await;

        assert_eq!(jobs.len(), 3);
        assert!(jobs.iter().all(|j| j.status == JobStatus::Pending));
        assert!(jobs.iter().all(|j| j.output_dir.starts_with("/out")));

        let candidates = repo.admission_candidates(10).await;
        let order: Vec<_> = candidates.iter().map(|j| j.input.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn identical_inputs_in_one_batch_get_distinct_dirs() {
        let repo = JobRepo::new("/out");
        let jobs = repo
            .submit(&inputs(&["https://example.com/game", "https://example.com/game"]))
            .await;

        assert_ne!(jobs[0].output_dir, jobs[1].output_dir);
        assert!(jobs[1]
            .output_dir
            .to_string_lossy()
            .ends_with(&format!(
                "{}-2",
                jobs[0].output_dir.file_name().unwrap().to_string_lossy()
            )));
    }

    #[tokio::test]
    async fn same_timestamp_across_batches_still_unique() {
        let repo = JobRepo::new("/out");
        let at = Utc::now();
        let first = repo.submit_at(&inputs(&["x"]), at).await;
        let second = repo.submit_at(&inputs(&["x"]), at).await;
        let third = repo.submit_at(&inputs(&["x"]), at).await;

        let mut dirs = vec![
            first[0].output_dir.clone(),
            second[0].output_dir.clone(),
            third[0].output_dir.clone(),
        ];
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), 3);
    }

    #[tokio::test]
    async fn admission_candidates_respects_max_and_does_not_mutate() {
        let repo = JobRepo::new("/out");
        repo.submit(&inputs(&["a", "b", "c"])).await;

        assert_eq!(repo.admission_candidates(2).await.len(), 2);
        assert_eq!(repo.admission_candidates(0).await.len(), 0);
        assert_eq!(repo.stats().await.pending, 3);
    }

    #[tokio::test]
    async fn running_jobs_leave_the_candidate_list() {
        let repo = JobRepo::new("/out");
        let jobs = repo.submit(&inputs(&["a", "b", "c"])).await;

        let running = repo.mark_running(jobs[1].id).await.unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.started_at.is_some());

        let order: Vec<_> = repo
            .admission_candidates(10)
            .await
            .into_iter()
            .map(|j| j.input)
            .collect();
        assert_eq!(order, ["a", "c"]);
    }

    #[tokio::test]
    async fn mark_running_twice_is_rejected() {
        let repo = JobRepo::new("/out");
        let job = repo.submit(&inputs(&["a"])).await.remove(0);

        repo.mark_running(job.id).await.unwrap();
        assert_matches!(
            repo.mark_running(job.id).await,
            Err(TransitionError::InvalidTransition {
                from: JobStatus::Running,
                to: JobStatus::Running,
                ..
            })
        );
        assert_eq!(repo.stats().await.running, 1);
    }

    #[tokio::test]
    async fn pending_job_cannot_complete_directly() {
        let repo = JobRepo::new("/out");
        let job = repo.submit(&inputs(&["a"])).await.remove(0);

        assert_matches!(
            repo.mark_completed(job.id, json!({})).await,
            Err(TransitionError::InvalidTransition { .. })
        );
        assert_eq!(repo.get(job.id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_job_transition_is_reported() {
        let repo = JobRepo::new("/out");
        let id = new_job_id();
        assert_eq!(
            repo.mark_running(id).await.unwrap_err(),
            TransitionError::UnknownJob(id)
        );
    }

    #[tokio::test]
    async fn terminal_transitions_set_exactly_one_outcome() {
        let repo = JobRepo::new("/out");
        let jobs = repo.submit(&inputs(&["ok", "bad"])).await;
        for job in &jobs {
            repo.mark_running(job.id).await.unwrap();
        }

        let done = repo
            .mark_completed(jobs[0].id, json!({"score": 9}))
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result_summary, Some(json!({"score": 9})));
        assert!(done.error.is_none());
        assert!(done.duration_ms().is_some());

        let failed = repo.mark_failed(jobs[1].id, "boom").await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.result_summary.is_none());

        assert_matches!(
            repo.mark_failed(jobs[0].id, "late").await,
            Err(TransitionError::InvalidTransition {
                from: JobStatus::Completed,
                ..
            })
        );
    }

    #[tokio::test]
    async fn stats_always_sum_to_total() {
        let repo = JobRepo::new("/out");
        let jobs = repo.submit(&inputs(&["a", "b", "c", "d"])).await;
        repo.mark_running(jobs[0].id).await.unwrap();
        repo.mark_running(jobs[1].id).await.unwrap();
        repo.mark_completed(jobs[0].id, json!(null)).await.unwrap();
        repo.mark_failed(jobs[1].id, "x").await.unwrap();
        repo.mark_running(jobs[2].id).await.unwrap();

        let stats = repo.stats().await;
        assert_eq!(
            stats,
            JobStats {
                pending: 1,
                running: 1,
                completed: 1,
                failed: 1,
            }
        );
        assert_eq!(stats.total(), repo.len().await);
    }

    #[tokio::test]
    async fn history_is_sorted_by_completion_desc() {
        let repo = JobRepo::new("/out");
        let jobs = repo.submit(&inputs(&["first", "second", "third"])).await;
        for job in &jobs {
            repo.mark_running(job.id).await.unwrap();
        }
        repo.mark_completed(jobs[0].id, json!(1)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.mark_failed(jobs[1].id, "x").await.unwrap();

        let history: Vec<_> = repo.history().await.into_iter().map(|j| j.input).collect();
        assert_eq!(history, ["second", "first"]);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let repo = JobRepo::new("/out");
        let jobs = repo.submit(&inputs(&["a", "b"])).await;
        repo.mark_running(jobs[1].id).await.unwrap();

        assert_eq!(repo.list(None).await.len(), 2);
        let running = repo.list(Some(JobStatus::Running)).await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].input, "b");
    }
}
