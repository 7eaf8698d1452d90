use std::sync::Arc;

use gauntlet_events::EventBus;
use gauntlet_pipeline::TaskExecutor;
use gauntlet_store::{JobRepo, ResultStore};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::engine::{ConcurrencyGate, JobDispatcher};
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory job table.
    pub repo: Arc<JobRepo>,
    /// Running-job ceiling.
    pub gate: Arc<ConcurrencyGate>,
    /// Fan-out hub for job events (WebSocket and SSE clients).
    pub event_bus: Arc<EventBus>,
    /// On-disk result records.
    pub results: ResultStore,
    /// Admission loop; handlers wake it after submissions.
    pub dispatcher: Arc<JobDispatcher>,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
    /// Cancelled when the server begins shutting down. Stops the
    /// dispatcher and ends open event streams.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire up the scheduler components around `executor`.
    ///
    /// The dispatcher loop is not started; spawn
    /// [`JobDispatcher::run`] on `state.dispatcher` with `state.shutdown`.
    pub fn new(config: ServerConfig, executor: Arc<dyn TaskExecutor>) -> Self {
        let scheduler = &config.scheduler;
        let repo = Arc::new(JobRepo::new(&scheduler.output_dir));
        let gate = Arc::new(ConcurrencyGate::new(scheduler.max_concurrent_jobs));
        let event_bus = Arc::new(EventBus::new(scheduler.subscriber_queue_capacity));
        let results = ResultStore::new(&scheduler.output_dir);

        let dispatcher = JobDispatcher::new(
            Arc::clone(&repo),
            Arc::clone(&gate),
            Arc::clone(&event_bus),
            results.clone(),
            executor,
        )
        .with_poll_interval(scheduler.tick);

        Self {
            config: Arc::new(config),
            repo,
            gate,
            event_bus,
            results,
            dispatcher: Arc::new(dispatcher),
            ws_manager: Arc::new(WsManager::new()),
            shutdown: CancellationToken::new(),
        }
    }
}
