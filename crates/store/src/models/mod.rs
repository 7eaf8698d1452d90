pub mod job;
pub mod status;

pub use job::{Job, JobStats};
pub use status::JobStatus;
