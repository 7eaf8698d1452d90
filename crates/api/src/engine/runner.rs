//! Per-job execution unit.
//!
//! A [`JobRunner`] drives one admitted job from output-directory creation
//! through the executor call to its termination sequence. Every failure
//! mode, including an executor panic, ends in a recorded terminal state.

use std::any::Any;
use std::sync::Arc;

use gauntlet_events::{EventBus, JobEvent};
use gauntlet_pipeline::{TaskExecutor, TaskRequest};
use gauntlet_store::models::Job;
use gauntlet_store::{JobRepo, ResultStore};
use tokio::sync::Notify;

use crate::engine::gate::GatePermit;
use crate::engine::progress::reporter_for;

/// Error recorded when an executor fails without saying why.
const UNKNOWN_FAILURE: &str = "Task failed without an error message";

/// Everything a job unit needs, cloned into each spawned task.
#[derive(Clone)]
pub struct JobRunner {
    repo: Arc<JobRepo>,
    bus: Arc<EventBus>,
    results: ResultStore,
    executor: Arc<dyn TaskExecutor>,
    /// Signalled when a slot frees so admission does not wait for a tick.
    wake: Arc<Notify>,
}

impl JobRunner {
    pub fn new(
        repo: Arc<JobRepo>,
        bus: Arc<EventBus>,
        results: ResultStore,
        executor: Arc<dyn TaskExecutor>,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            repo,
            bus,
            results,
            executor,
            wake,
        }
    }

    /// Execute `job` (already marked running) and run its termination
    /// sequence. `permit` is the job's gate slot.
    pub async fn run(self, job: Job, permit: GatePermit) {
        let job_id = job.id;
        let outcome = self.execute(&job).await;

        // Terminal state is recorded before the slot is released.
        let finished = match outcome {
            Ok(summary) => {
                tracing::info!(%job_id, "Job completed");
                self.repo.mark_completed(job_id, summary).await
            }
            Err(error) => {
                tracing::warn!(%job_id, error = %error, "Job failed");
                self.repo.mark_failed(job_id, error).await
            }
        };
        drop(permit);
        self.wake.notify_one();

        let job = match finished {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Could not record job outcome");
                return;
            }
        };

        match self.results.persist(&job).await {
            Ok(record) => tracing::debug!(
                %job_id,
                artifacts = record.artifacts.len(),
                "Result record written",
            ),
            Err(e) => tracing::error!(%job_id, error = %e, "Failed to persist job result"),
        }

        if let Some(event) = JobEvent::terminal(&job) {
            self.bus.publish(event);
        }
        self.bus
            .publish(JobEvent::StatsUpdate(self.repo.stats().await));
    }

    /// Prepare the output directory and await the executor.
    ///
    /// Returns the result summary, or the error string to record.
    async fn execute(&self, job: &Job) -> Result<serde_json::Value, String> {
        if let Err(e) = self.results.prepare_job_dir(job).await {
            return Err(format!("Failed to create output directory: {e}"));
        }

        let request = TaskRequest {
            job_id: job.id,
            input: job.input.clone(),
            output_dir: job.output_dir.clone(),
        };
        let reporter = reporter_for(job.id, Arc::clone(&self.bus));
        let executor = Arc::clone(&self.executor);

        // A nested task turns an executor panic into a JoinError.
        let handle =
            tokio::spawn(async move { executor.execute(request, reporter).await });

        match handle.await {
            Ok(Ok(outcome)) => Ok(outcome.summary),
            Ok(Err(e)) => {
                let message = e.to_string();
                if message.trim().is_empty() {
                    Err(UNKNOWN_FAILURE.to_string())
                } else {
                    Err(message)
                }
            }
            Err(e) if e.is_panic() => Err(format!(
                "Task executor panicked: {}",
                panic_message(e.into_panic().as_ref())
            )),
            Err(e) => Err(format!("Task executor was cancelled: {e}")),
        }
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
