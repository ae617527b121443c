//! Specific background job implementations.

pub mod extractor_update;
pub mod retention_sweep;

pub use extractor_update::ExtractorUpdateJob;
pub use retention_sweep::{RetentionSweepJob, SweepStats};
