//! Job execution engine.
//!
//! Contains the concurrency gate, the background dispatcher that admits
//! pending jobs, the per-job runner, and the progress relay that turns
//! executor updates into bus events.

pub mod dispatcher;
pub mod gate;
pub mod progress;
pub mod runner;

pub use dispatcher::JobDispatcher;
pub use gate::{ConcurrencyGate, GatePermit};
pub use runner::JobRunner;
