//! Executor that delegates each job to an external program.
//!
//! The program is started once per job as
//! `{program} {args...} {input}` with its working directory set to the
//! job's output directory. It reports progress on stdout using the
//! [`protocol`](crate::protocol) line format; stderr is captured and only
//! surfaced when the program exits unsuccessfully.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::executor::{ProgressReporter, TaskError, TaskExecutor, TaskOutcome, TaskRequest};
use crate::protocol::{parse_line, ParsedLine};

/// Maximum stderr captured per job (64 KiB).
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Trailing stderr characters kept in the error message.
const STDERR_TAIL_CHARS: usize = 2000;

/// Environment variables exported to the executor program.
pub const ENV_JOB_ID: &str = "GAUNTLET_JOB_ID";
pub const ENV_INPUT: &str = "GAUNTLET_INPUT";
pub const ENV_OUTPUT_DIR: &str = "GAUNTLET_OUTPUT_DIR";

/// How to launch the executor program.
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Program path or name resolved through `PATH`.
    pub program: PathBuf,
    /// Arguments placed before the job input.
    pub args: Vec<String>,
    /// Kill the program after this long. `None` lets it run forever.
    pub timeout: Option<Duration>,
}

impl CommandConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`TaskExecutor`] backed by one child process per job.
pub struct CommandExecutor {
    config: CommandConfig,
}

impl CommandExecutor {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, request: &TaskRequest) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(&request.input)
            .env(ENV_JOB_ID, request.job_id.to_string())
            .env(ENV_INPUT, &request.input)
            .env(ENV_OUTPUT_DIR, &request.output_dir)
            .current_dir(&request.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Killed if the job future is dropped (e.g. on timeout).
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TaskExecutor for CommandExecutor {
    async fn execute(
        &self,
        request: TaskRequest,
        progress: ProgressReporter,
    ) -> Result<TaskOutcome, TaskError> {
        let start = Instant::now();
        let mut child = self
            .build_command(&request)
            .spawn()
            .map_err(TaskError::Spawn)?;

        tracing::debug!(
            job_id = %request.job_id,
            program = %self.config.program.display(),
            pid = child.id(),
            "Executor process started",
        );

        let stdout = child.stdout.take();
        let stderr_task = tokio::spawn(read_capped(child.stderr.take()));

        let run = async {
            let mut summary = None;
            let mut reported_error = None;

            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    if reader.read_until(b'\n', &mut buf).await? == 0 {
                        break;
                    }
                    // Programs are not required to emit UTF-8.
                    let line = String::from_utf8_lossy(&buf);
                    match parse_line(&line) {
                        Some(ParsedLine::Update(update)) => progress.report(update),
                        Some(ParsedLine::Result(value)) => summary = Some(value),
                        Some(ParsedLine::Error(message)) => reported_error = Some(message),
                        None => {}
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, summary, reported_error))
        };

        let (status, summary, reported_error) = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result?,
                Err(_elapsed) => {
                    return Err(TaskError::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
            },
            None => run.await?,
        };

        let stderr_bytes = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(TaskError::ExitStatus {
                exit_code: status.code().unwrap_or(-1),
                stderr: tail(stderr.trim(), STDERR_TAIL_CHARS),
            });
        }

        if let Some(message) = reported_error {
            return Err(TaskError::Failed(message));
        }

        Ok(TaskOutcome {
            summary: summary.unwrap_or_else(|| serde_json::json!({})),
        })
    }
}

/// Read a stream to the end, keeping at most [`MAX_STDERR_BYTES`].
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h).take(MAX_STDERR_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

/// Last `max_chars` characters of `text`.
fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}
