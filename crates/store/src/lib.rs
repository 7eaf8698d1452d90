//! Job state and result persistence.
//!
//! - [`repositories::JobRepo`] holds every submitted job in memory and
//!   owns lifecycle transitions.
//! - [`results::ResultStore`] writes terminal job records to disk and
//!   lists them back for history queries.

pub mod models;
pub mod repositories;
pub mod results;

pub use repositories::JobRepo;
pub use results::{ResultRecord, ResultStore, StoreError};
