//! Background job dispatcher.
//!
//! Admits pending jobs in submission order whenever the concurrency gate
//! has free slots. The loop wakes on a fixed tick and additionally as soon
//! as jobs are submitted or a running job frees its slot. Each admitted job
//! runs on its own task under a [`TaskTracker`]; the loop never awaits a
//! job's completion.

use std::sync::Arc;
use std::time::Duration;

use gauntlet_events::{EventBus, JobEvent};
use gauntlet_pipeline::TaskExecutor;
use gauntlet_store::{JobRepo, ResultStore};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::engine::gate::ConcurrencyGate;
use crate::engine::runner::JobRunner;

/// Default polling interval for the dispatcher loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Single long-lived admission loop.
pub struct JobDispatcher {
    repo: Arc<JobRepo>,
    gate: Arc<ConcurrencyGate>,
    bus: Arc<EventBus>,
    runner: JobRunner,
    poll_interval: Duration,
    wake: Arc<Notify>,
    tracker: TaskTracker,
}

impl JobDispatcher {
    /// Create a new dispatcher with the default 1-second poll interval.
    pub fn new(
        repo: Arc<JobRepo>,
        gate: Arc<ConcurrencyGate>,
        bus: Arc<EventBus>,
        results: ResultStore,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        let wake = Arc::new(Notify::new());
        let runner = JobRunner::new(
            Arc::clone(&repo),
            Arc::clone(&bus),
            results,
            executor,
            Arc::clone(&wake),
        );
        Self {
            repo,
            gate,
            bus,
            runner,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wake,
            tracker: TaskTracker::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Ask the loop to run an admission pass without waiting for the tick.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            limit = self.gate.limit(),
            "Job dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }
            self.dispatch_once().await;
        }
    }

    /// One admission pass. Returns the number of jobs started.
    pub async fn dispatch_once(&self) -> usize {
        let available = self.gate.available_slots();
        if available == 0 {
            return 0;
        }

        let candidates = self.repo.admission_candidates(available).await;
        let mut started = 0;

        for candidate in candidates {
            let Some(permit) = self.gate.try_acquire() else {
                break;
            };

            // The permit drops (freeing the slot) if the transition fails.
            let job = match self.repo.mark_running(candidate.id).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(job_id = %candidate.id, error = %e, "Skipping admission");
                    continue;
                }
            };

            tracing::info!(
                job_id = %job.id,
                input = %job.input,
                output_dir = %job.output_dir.display(),
                "Job admitted",
            );
            self.bus.publish(JobEvent::started(&job));
            self.tracker.spawn(self.runner.clone().run(job, permit));
            started += 1;
        }

        if started > 0 {
            self.bus
                .publish(JobEvent::StatsUpdate(self.repo.stats().await));
        }
        started
    }

    /// Number of job units still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop tracking new work and wait up to `timeout` for in-flight jobs
    /// to finish their termination sequence.
    ///
    /// Returns `false` if the timeout elapsed first. Call after the loop
    /// has been cancelled.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for running jobs to finish");
        }
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }
}
