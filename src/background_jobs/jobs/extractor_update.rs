//! Background job that keeps the yt-dlp binary current.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError},
};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

pub struct ExtractorUpdateJob {
    binary: PathBuf,
    interval: Duration,
}

impl ExtractorUpdateJob {
    /// `interval_minutes` is clamped to at least one minute.
    pub fn new(binary: PathBuf, interval_minutes: u64) -> Self {
        Self {
            binary,
            interval: Duration::from_secs(interval_minutes.max(1) * 60),
        }
    }
}

impl BackgroundJob for ExtractorUpdateJob {
    fn id(&self) -> &'static str {
        "extractor_update"
    }

    fn name(&self) -> &'static str {
        "yt-dlp Self Update"
    }

    fn description(&self) -> &'static str {
        "Runs yt-dlp -U so extraction keeps working as sites change"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        debug!("Running {:?} -U", self.binary);
        let output = Command::new(&self.binary)
            .arg("-U")
            .output()
            .map_err(|e| {
                JobError::ExecutionFailed(format!("Failed to run {:?}: {}", self.binary, e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(JobError::ExecutionFailed(format!(
                "yt-dlp -U exited with {}: {}",
                output.status,
                last_line(&stderr).or_else(|| last_line(&stdout)).unwrap_or("")
            )));
        }

        info!(
            "yt-dlp update check: {}",
            last_line(&stdout).unwrap_or("no output")
        );
        Ok(())
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}
