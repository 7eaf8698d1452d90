//! Task execution boundary.
//!
//! The scheduler hands every admitted job to a [`TaskExecutor`]. The
//! executor performs the actual automation, reports progress through a
//! [`ProgressReporter`], and resolves to a terminal [`TaskOutcome`] or
//! [`TaskError`].
//!
//! [`CommandExecutor`] is the bundled implementation: it runs an external
//! program per job and translates its stdout line protocol (see
//! [`protocol`]) into progress updates.

pub mod command;
pub mod executor;
pub mod protocol;

pub use command::{CommandConfig, CommandExecutor};
pub use executor::{
    ProgressReporter, TaskError, TaskExecutor, TaskOutcome, TaskRequest, TaskUpdate,
};
