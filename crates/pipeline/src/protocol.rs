//! Stdout line protocol spoken by external executor programs.
//!
//! Each line the program prints is either a JSON object with a `type`
//! field or plain text:
//!
//! ```text
//! {"type": "log", "level": "warn", "message": "slow response"}
//! {"type": "progress", "step": 3, "total": 10, "message": "clicked start"}
//! {"type": "screenshot", "path": "step-3.png", "step": 3}
//! {"type": "result", "summary": {"score": 42}}
//! {"type": "error", "message": "game never loaded"}
//! plain text becomes an info-level log line
//! ```

use gauntlet_core::job_events::LogLevel;
use serde::Deserialize;

use crate::executor::TaskUpdate;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireLine {
    Log {
        #[serde(default)]
        level: LogLevel,
        message: String,
    },
    Progress {
        step: u32,
        total: Option<u32>,
        message: Option<String>,
    },
    Screenshot {
        path: String,
        step: Option<u32>,
    },
    Result {
        #[serde(default)]
        summary: serde_json::Value,
    },
    Error {
        message: String,
    },
}

/// Meaning of one stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Update(TaskUpdate),
    /// Final result summary of the task.
    Result(serde_json::Value),
    /// The task reported its own failure.
    Error(String),
}

/// Interpret one stdout line. Blank lines yield `None`.
///
/// Lines that are not a recognised JSON message are passed through as
/// info-level log updates, so ordinary program output is never lost.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = match serde_json::from_str::<WireLine>(trimmed) {
        Ok(WireLine::Log { level, message }) => {
            ParsedLine::Update(TaskUpdate::Log { level, message })
        }
        Ok(WireLine::Progress {
            step,
            total,
            message,
        }) => ParsedLine::Update(TaskUpdate::Progress {
            step,
            total,
            message,
        }),
        Ok(WireLine::Screenshot { path, step }) => {
            ParsedLine::Update(TaskUpdate::Screenshot { path, step })
        }
        Ok(WireLine::Result { summary }) => ParsedLine::Result(summary),
        Ok(WireLine::Error { message }) => ParsedLine::Error(message),
        Err(_) => ParsedLine::Update(TaskUpdate::Log {
            level: LogLevel::Info,
            message: trimmed.to_string(),
        }),
    };

    Some(parsed)
}
