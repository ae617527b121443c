//! Background job that deletes aged download artifacts.
//!
//! Every entry directly under the downloads root is a job temp dir (or a
//! stray file). Anything last modified before the cutoff is removed together
//! with the job records pointing at it. Finished records older than the cutoff
//! whose temp dir never made it to disk are dropped as well. This is the only
//! place job records are ever deleted.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError},
};
use crate::jobs::JobRegistry;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub deleted: usize,
    pub evicted: usize,
    pub errors: usize,
}

pub struct RetentionSweepJob {
    downloads_dir: PathBuf,
    max_age: Duration,
    interval: Duration,
}

impl RetentionSweepJob {
    pub fn new(downloads_dir: PathBuf, max_age: Duration, interval: Duration) -> Self {
        Self {
            downloads_dir,
            max_age,
            interval,
        }
    }

    /// One sweep pass, treating `now` as the current time.
    ///
    /// Failures on single entries are counted and skipped.
    pub fn sweep_at(
        &self,
        registry: &JobRegistry,
        now: SystemTime,
        is_cancelled: impl Fn() -> bool,
    ) -> Result<SweepStats, JobError> {
        let mut stats = SweepStats::default();

        let entries = match std::fs::read_dir(&self.downloads_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "Downloads directory does not exist yet: {:?}",
                    self.downloads_dir
                );
                return Ok(stats);
            }
            Err(e) => {
                return Err(JobError::ExecutionFailed(format!(
                    "Failed to read downloads directory: {}",
                    e
                )));
            }
        };

        for entry in entries {
            if is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };
            stats.scanned += 1;

            let path = entry.path();
            let age = match entry_age(&path, now) {
                Ok(Some(age)) => age,
                // Modified in the future relative to `now`.
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to get modified time for {:?}: {}", path, e);
                    stats.errors += 1;
                    continue;
                }
            };

            if age < self.max_age {
                continue;
            }

            match remove_entry(&path) {
                Ok(()) => {
                    stats.deleted += 1;
                    debug!("Deleted expired artifact {:?} (age: {}s)", path, age.as_secs());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to delete {:?}: {}", path, e);
                    stats.errors += 1;
                    continue;
                }
            }

            let evicted = registry.remove_by_temp_dir(&path);
            if !evicted.is_empty() {
                debug!("Evicted jobs {:?}", evicted);
            }
            stats.evicted += evicted.len();
        }

        stats.evicted += self.evict_orphans(registry, now, &is_cancelled)?;
        Ok(stats)
    }

    /// Drops expired finished records that have no artifacts left to sweep.
    fn evict_orphans(
        &self,
        registry: &JobRegistry,
        now: SystemTime,
        is_cancelled: &impl Fn() -> bool,
    ) -> Result<usize, JobError> {
        let mut evicted = 0;
        for job in registry.terminal_jobs() {
            if is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let created = SystemTime::from(job.created_at);
            let expired = now
                .duration_since(created)
                .map(|age| age >= self.max_age)
                .unwrap_or(false);
            let artifacts_gone = !matches!(job.temp_dir(), Some(dir) if dir.exists());
            if expired && artifacts_gone && registry.delete(&job.id).is_some() {
                debug!("Evicted job {} with no artifacts on disk", job.id);
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}

fn entry_age(path: &Path, now: SystemTime) -> std::io::Result<Option<Duration>> {
    let modified = std::fs::symlink_metadata(path)?.modified()?;
    Ok(now.duration_since(modified).ok())
}

fn remove_entry(path: &Path) -> std::io::Result<()> {
    let file_type = std::fs::symlink_metadata(path)?.file_type();
    if file_type.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

impl BackgroundJob for RetentionSweepJob {
    fn id(&self) -> &'static str {
        "retention_sweep"
    }

    fn name(&self) -> &'static str {
        "Download Retention Sweep"
    }

    fn description(&self) -> &'static str {
        "Deletes expired download artifacts and the jobs that produced them"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let stats = self.sweep_at(&ctx.registry, SystemTime::now(), || ctx.is_cancelled())?;
        info!(
            "Retention sweep complete: scanned={}, deleted={}, evicted={}, errors={}",
            stats.scanned, stats.deleted, stats.evicted, stats.errors
        );
        Ok(())
    }
}
