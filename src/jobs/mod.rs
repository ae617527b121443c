//! Download job orchestration: lifecycle, registry, admission control,
//! execution and progress streaming.

mod models;
mod progress_stream;
mod rate_limit;
mod registry;
mod runner;

pub use models::{
    JobErrorKind, JobProgress, JobRecord, JobSnapshot, JobStatus, MediaFormat, OutputFile,
    RequestMetadata, TransitionError,
};
pub use progress_stream::job_progress_stream;
pub use rate_limit::{ClientRateLimiter, RateLimitConfig};
pub use registry::{JobRegistry, RegistryError};
pub use runner::{find_output, JobRequest, JobRunner, RunError, RunnerSettings, COOKIES_FILE_NAME};
