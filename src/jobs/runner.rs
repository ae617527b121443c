//! Job execution.
//!
//! Each accepted job runs exactly once on its own task: allocate the temp dir,
//! invoke the extraction engine, locate the produced file and record the
//! outcome. Failures never escape [`JobRunner::run`]; they end up in the record.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::models::{JobErrorKind, JobProgress, MediaFormat, OutputFile, TransitionError};
use super::registry::JobRegistry;
use crate::extractor::{
    ExtractionError, ExtractionRequest, MediaExtractor, ProgressReporter, ProgressUpdate,
};

/// Name of the job-scoped cookie file written inside the temp dir.
pub const COOKIES_FILE_NAME: &str = "cookies.txt";

const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// Everything the runner needs for one job. Credentials live here only,
/// never in the registry.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: String,
    pub url: String,
    pub format: MediaFormat,
    pub cookies: Option<String>,
    pub proxy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Root under which every job gets its own temp dir.
    pub downloads_dir: PathBuf,
    /// Cookie blob used when a request carries none.
    pub default_cookies: Option<String>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Output file not found after download")]
    OutputMissing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job {0} is no longer in the registry")]
    JobVanished(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Extraction engine task failed: {0}")]
    EngineTask(#[from] tokio::task::JoinError),
}

impl RunError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            RunError::Extraction(ExtractionError::DownloadFailed(_)) => JobErrorKind::Extraction,
            RunError::Extraction(ExtractionError::TranscoderUnavailable(_))
            | RunError::OutputMissing => JobErrorKind::OutputMissing,
            _ => JobErrorKind::Unexpected,
        }
    }
}

/// Relays engine progress into the job's record.
struct RegistryProgressReporter {
    registry: Arc<JobRegistry>,
    job_id: String,
}

impl ProgressReporter for RegistryProgressReporter {
    fn report(&self, update: ProgressUpdate) {
        let progress = match update {
            ProgressUpdate::Downloading {
                downloaded,
                total,
                eta,
            } => JobProgress::downloading(downloaded, total, eta),
            ProgressUpdate::Finished => JobProgress::Finished,
            ProgressUpdate::Other(_) => return,
        };
        self.registry
            .update(&self.job_id, |job| job.set_progress(progress));
    }
}

pub struct JobRunner {
    registry: Arc<JobRegistry>,
    extractor: Arc<dyn MediaExtractor>,
    settings: RunnerSettings,
}

impl JobRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        extractor: Arc<dyn MediaExtractor>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            registry,
            extractor,
            settings,
        }
    }

    /// Runs the job on a new task and returns immediately.
    pub fn dispatch(self: &Arc<Self>, request: JobRequest) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        debug!("Dispatching job {}", request.job_id);
        tokio::spawn(async move { runner.run(request).await })
    }

    /// Runs the job to completion and records the outcome.
    pub async fn run(&self, request: JobRequest) {
        let job_id = request.job_id.clone();
        match self.execute(request).await {
            Ok(output) => {
                info!(
                    "Job {} ready: {} ({:?} bytes)",
                    job_id,
                    output.path.display(),
                    output.size
                );
                let result = self.registry.update(&job_id, |job| job.complete(output));
                if !matches!(result, Some(Ok(()))) {
                    warn!("Could not mark job {} as ready: {:?}", job_id, result);
                }
            }
            Err(err) => {
                let kind = err.kind();
                error!("Job {} failed ({:?}): {}", job_id, kind, err);
                let result = self.registry.update(&job_id, |job| job.fail(kind));
                if !matches!(result, Some(Ok(()))) {
                    warn!("Could not mark job {} as failed: {:?}", job_id, result);
                }
            }
        }
    }

    async fn execute(&self, request: JobRequest) -> Result<OutputFile, RunError> {
        // Assigned before the directory exists, so a record whose directory
        // could not be created still carries it and the sweeper can retire it.
        let temp_dir = self.settings.downloads_dir.join(&request.job_id);
        self.registry
            .update(&request.job_id, |job| job.start(temp_dir.clone()))
            .ok_or_else(|| RunError::JobVanished(request.job_id.clone()))??;
        tokio::fs::create_dir_all(&temp_dir).await?;
        info!("Job {} started in {}", request.job_id, temp_dir.display());

        let cookies_file = self.materialize_cookies(&request, &temp_dir).await?;

        let extraction = ExtractionRequest {
            url: request.url.clone(),
            format: request.format,
            output_template: temp_dir.join(OUTPUT_TEMPLATE),
            cookies_file,
            proxy: request.proxy.clone(),
        };
        let reporter: Arc<dyn ProgressReporter> = Arc::new(RegistryProgressReporter {
            registry: Arc::clone(&self.registry),
            job_id: request.job_id.clone(),
        });

        // The engine runs on its own task so that a panic inside it is
        // contained and reported as a failed job.
        let extractor = Arc::clone(&self.extractor);
        tokio::spawn(async move { extractor.extract(extraction, reporter).await }).await??;

        let extension = request.format.output_extension();
        let temp_dir_for_scan = temp_dir.clone();
        let path = tokio::task::spawn_blocking(move || find_output(&temp_dir_for_scan, extension))
            .await?
            .ok_or(RunError::OutputMissing)?;

        let size = tokio::fs::metadata(&path).await.ok().map(|m| m.len());
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.{}", request.job_id, extension));

        Ok(OutputFile {
            path,
            filename,
            size,
        })
    }

    /// Writes the request cookies, or the service-wide default, into a file
    /// owned by this job.
    ///
    /// Failing to write request cookies fails the job. The default blob is
    /// optional: public media downloads without it, so a write failure only
    /// drops it.
    async fn materialize_cookies(
        &self,
        request: &JobRequest,
        temp_dir: &Path,
    ) -> Result<Option<PathBuf>, RunError> {
        let path = temp_dir.join(COOKIES_FILE_NAME);

        if let Some(cookies) = &request.cookies {
            tokio::fs::write(&path, cookies).await?;
            debug!("Using request cookies for job {}", request.job_id);
            return Ok(Some(path));
        }

        let Some(default) = &self.settings.default_cookies else {
            return Ok(None);
        };
        match tokio::fs::write(&path, default).await {
            Ok(()) => {
                debug!("Using default cookies for job {}", request.job_id);
                Ok(Some(path))
            }
            Err(e) => {
                warn!(
                    "Failed to write default cookies for job {}, continuing without: {}",
                    request.job_id, e
                );
                Ok(None)
            }
        }
    }
}

/// First file under `dir` whose extension matches `extension` (case-insensitive).
pub fn find_output(dir: &Path, extension: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .find(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
}
