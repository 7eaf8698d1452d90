//! Shared domain primitives for the Gauntlet job coordinator.
//!
//! Pure logic only: identifier and timestamp aliases, the common error
//! type, output directory naming, and the wire names of job events.

pub mod error;
pub mod job_events;
pub mod naming;
pub mod types;
