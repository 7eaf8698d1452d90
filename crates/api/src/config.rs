use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields except the executor program have sensible defaults suitable
/// for local development. In production, override via environment
/// variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight jobs, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
    /// External task executor settings.
    pub executor: ExecutorConfig,
}

/// Settings for admission and event fan-out.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Root directory for per-job output directories (default: `./output`).
    pub output_dir: PathBuf,
    /// Maximum number of simultaneously running jobs (default: `2`).
    pub max_concurrent_jobs: usize,
    /// Admission poll interval (default: 1000 ms).
    pub tick: Duration,
    /// Per-subscriber event queue depth (default: `256`).
    pub subscriber_queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            max_concurrent_jobs: 2,
            tick: Duration::from_millis(1000),
            subscriber_queue_capacity: 256,
        }
    }
}

/// Settings for the bundled command executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Program started once per job.
    pub program: PathBuf,
    /// Arguments placed before the job input.
    pub args: Vec<String>,
    /// Per-job timeout; `None` means unbounded.
    pub timeout: Option<Duration>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `OUTPUT_DIR`                | `./output`              |
    /// | `MAX_CONCURRENT_JOBS`       | `2`                     |
    /// | `SCHEDULER_TICK_MS`         | `1000`                  |
    /// | `SUBSCRIBER_QUEUE_CAPACITY` | `256`                   |
    /// | `EXECUTOR_PROGRAM`          | required                |
    /// | `EXECUTOR_ARGS`             | empty                   |
    /// | `EXECUTOR_TIMEOUT_SECS`     | unset (no timeout)      |
    ///
    /// Panics on missing or malformed values so misconfiguration fails at
    /// startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_env("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs: u64 = parse_env("SHUTDOWN_TIMEOUT_SECS", 30);

        let defaults = SchedulerConfig::default();
        let max_concurrent_jobs: usize =
            parse_env("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs);
        assert!(max_concurrent_jobs >= 1, "MAX_CONCURRENT_JOBS must be at least 1");

        let scheduler = SchedulerConfig {
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_concurrent_jobs,
            tick: Duration::from_millis(parse_env("SCHEDULER_TICK_MS", 1000)),
            subscriber_queue_capacity: parse_env(
                "SUBSCRIBER_QUEUE_CAPACITY",
                defaults.subscriber_queue_capacity,
            ),
        };

        let executor = ExecutorConfig {
            program: std::env::var("EXECUTOR_PROGRAM")
                .map(PathBuf::from)
                .expect("EXECUTOR_PROGRAM must be set"),
            args: std::env::var("EXECUTOR_ARGS")
                .map(|v| v.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            timeout: std::env::var("EXECUTOR_TIMEOUT_SECS").ok().map(|v| {
                Duration::from_secs(
                    v.parse()
                        .expect("EXECUTOR_TIMEOUT_SECS must be a valid u64"),
                )
            }),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            scheduler,
            executor,
        }
    }
}

/// Read `name` and parse it, falling back to `default` when unset.
fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
