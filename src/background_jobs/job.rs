use super::context::JobContext;
use std::time::Duration;

/// Why a periodic maintenance run did not complete.
#[derive(Debug)]
pub enum JobError {
    ExecutionFailed(String),
    Cancelled,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::ExecutionFailed(msg) => write!(f, "Maintenance run failed: {}", msg),
            JobError::Cancelled => write!(f, "Maintenance run cancelled"),
        }
    }
}

impl std::error::Error for JobError {}

/// Periodic maintenance task, such as the retention sweep or the yt-dlp updater.
///
/// `execute` runs on the blocking pool, so implementations may do plain
/// filesystem and process work.
pub trait BackgroundJob: Send + Sync {
    /// Stable key used by the scheduler.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// One line shown when the job is registered.
    fn description(&self) -> &'static str;

    /// Delay between the end of one run and the start of the next.
    fn interval(&self) -> Duration;

    /// Performs one run. Work spanning many items should poll
    /// `ctx.is_cancelled()` and bail out with [`JobError::Cancelled`].
    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
