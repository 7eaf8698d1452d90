#![allow(dead_code)]

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use gauntlet_api::config::{ExecutorConfig, SchedulerConfig, ServerConfig};
use gauntlet_api::router::build_app_router;
use gauntlet_api::state::AppState;
use gauntlet_events::LogLevel;
use gauntlet_pipeline::{
    ProgressReporter, TaskError, TaskExecutor, TaskOutcome, TaskRequest,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Artifact file the mock executor writes into every output directory.
pub const MOCK_ARTIFACT: &str = "screenshot-1.png";

/// Build a test `ServerConfig` writing under `output_dir`.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a short scheduler tick so tests do not wait on the 1 s default.
pub fn test_config(output_dir: &Path, limit: usize) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        scheduler: SchedulerConfig {
            output_dir: output_dir.to_path_buf(),
            max_concurrent_jobs: limit,
            tick: Duration::from_millis(50),
            subscriber_queue_capacity: 1024,
        },
        executor: ExecutorConfig {
            program: "unused".into(),
            args: Vec::new(),
            timeout: None,
        },
    }
}

// ---------------------------------------------------------------------------
// Mock executor
// ---------------------------------------------------------------------------

/// Executor whose behaviour is chosen by the job input:
///
/// - inputs containing `fail` return a task error,
/// - inputs containing `panic` panic,
/// - everything else succeeds with `{"input": <input>}` after `delay`.
///
/// Every run logs a line, sleeps, reports one progress step and writes
/// [`MOCK_ARTIFACT`] into the output directory.
pub struct MockExecutor {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Highest number of simultaneous `execute` calls observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Inputs in the order `execute` was called.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskExecutor for MockExecutor {
    async fn execute(
        &self,
        request: TaskRequest,
        progress: ProgressReporter,
    ) -> Result<TaskOutcome, TaskError> {
        self.calls.lock().unwrap().push(request.input.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        progress.log(LogLevel::Info, format!("opening {}", request.input));
        tokio::time::sleep(self.delay).await;
        progress.progress(1, Some(1), Some("done".into()));

        std::fs::write(request.output_dir.join(MOCK_ARTIFACT), b"png")?;
        progress.screenshot(MOCK_ARTIFACT, Some(1));

        if request.input.contains("panic") {
            panic!("mock executor exploded");
        }
        if request.input.contains("fail") {
            return Err(TaskError::Failed(format!("could not play {}", request.input)));
        }
        Ok(TaskOutcome {
            summary: json!({ "input": request.input }),
        })
    }
}

// ---------------------------------------------------------------------------
// App harness
// ---------------------------------------------------------------------------

/// A running scheduler plus its router. Dropping it stops the dispatcher.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub executor: Arc<MockExecutor>,
    _output: TempDir,
}

impl TestApp {
    pub fn output_root(&self) -> &Path {
        self._output.path()
    }

    /// Submit inputs directly through the repository and wake the loop.
    pub async fn submit(&self, inputs: &[&str]) -> Vec<gauntlet_store::models::Job> {
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        let jobs = self.state.repo.submit(&inputs).await;
        self.state.dispatcher.wake();
        jobs
    }

    /// Wait until no job is pending or running.
    pub async fn wait_idle(&self) {
        let repo = Arc::clone(&self.state.repo);
        wait_until(Duration::from_secs(10), || {
            let repo = Arc::clone(&repo);
            async move {
                let stats = repo.stats().await;
                stats.pending == 0 && stats.running == 0
            }
        })
        .await;
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.state.shutdown.cancel();
    }
}

/// Build the full application with the dispatcher loop running.
pub async fn spawn_app(limit: usize, executor: Arc<MockExecutor>) -> TestApp {
    spawn_app_with_queue(limit, executor, 1024).await
}

/// Like [`spawn_app`], with a custom per-subscriber queue depth.
pub async fn spawn_app_with_queue(
    limit: usize,
    executor: Arc<MockExecutor>,
    queue_capacity: usize,
) -> TestApp {
    let output = tempfile::tempdir().unwrap();
    let mut config = test_config(output.path(), limit);
    config.scheduler.subscriber_queue_capacity = queue_capacity;
    let state = AppState::new(config.clone(), executor.clone());
    state.results.ensure_root().await.unwrap();

    let dispatcher = Arc::clone(&state.dispatcher);
    let token = state.shutdown.clone();
    tokio::spawn(async move { dispatcher.run(token).await });

    let router = build_app_router(state.clone(), &config);
    TestApp {
        state,
        router,
        executor,
        _output: output,
    }
}

/// Poll `condition` every 10 ms until it holds; panics after `timeout`.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json(app: Router, method: Method, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send_json(app, Method::POST, uri, body).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send_json(app, Method::PUT, uri, body).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
