pub mod history;
pub mod jobs;
pub mod status;
