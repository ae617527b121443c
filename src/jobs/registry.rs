//! In-memory job registry.
//!
//! Single source of truth for job state. Every access takes the lock for the
//! duration of one read or write and hands out owned copies, so callers never
//! hold the lock across an await point or an engine call.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::models::{JobRecord, JobSnapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Job {0} already exists")]
    AlreadyExists(String),
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        // Records are only mutated through non-panicking transitions.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a new record. Identifiers are never reused.
    pub fn create(&self, record: JobRecord) -> Result<(), RegistryError> {
        let mut jobs = self.lock();
        if jobs.contains_key(&record.id) {
            return Err(RegistryError::AlreadyExists(record.id));
        }
        jobs.insert(record.id.clone(), record);
        Ok(())
    }

    /// Returns a copy of the record, if present.
    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.lock().get(id).cloned()
    }

    /// Client-facing view of a job, `unknown` when absent.
    pub fn snapshot(&self, id: &str) -> JobSnapshot {
        self.lock()
            .get(id)
            .map(JobSnapshot::from)
            .unwrap_or_else(JobSnapshot::unknown)
    }

    /// Applies `mutator` to the record atomically. Returns None if the job is absent.
    pub fn update<R>(&self, id: &str, mutator: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        self.lock().get_mut(id).map(mutator)
    }

    pub fn delete(&self, id: &str) -> Option<JobRecord> {
        self.lock().remove(id)
    }

    /// Removes every record whose temp dir is `path`, returning the evicted ids.
    pub fn remove_by_temp_dir(&self, path: &Path) -> Vec<String> {
        let mut jobs = self.lock();
        let ids: Vec<String> = jobs
            .values()
            .filter(|job| job.temp_dir() == Some(path))
            .map(|job| job.id.clone())
            .collect();
        for id in &ids {
            jobs.remove(id);
        }
        ids
    }

    /// Owned copies of every `ready` or `error` record.
    pub fn terminal_jobs(&self) -> Vec<JobRecord> {
        self.lock()
            .values()
            .filter(|job| job.status().is_terminal())
            .cloned()
            .collect()
    }

    /// Number of non-terminal jobs requested by `client_id`.
    pub fn count_active_for_client(&self, client_id: &str) -> usize {
        self.lock()
            .values()
            .filter(|job| job.request.client_id == client_id && !job.status().is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
