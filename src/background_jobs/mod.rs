//! Background job scheduling and execution.
//!
//! Periodic maintenance tasks (artifact retention, engine updates) run here,
//! off the request path.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError};
pub use scheduler::JobScheduler;
