//! Data models for download jobs.
//!
//! Defines the job record, its lifecycle states, progress snapshots and the
//! classified failure kinds surfaced to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lifecycle status of a job.
///
/// `Queued -> Running -> Ready` or `Queued -> Running -> Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Ready, // terminal
    Error, // terminal
}

impl JobStatus {
    /// Returns true if this is a terminal state (Ready or Error).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Ready => "ready",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output directive requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    /// Audio only, re-encoded to MP3.
    Audio,
    /// Best video merged with best audio into an MP4 container.
    Video,
}

impl MediaFormat {
    /// Anything other than `"audio"` (including no value at all) selects video.
    pub fn from_request(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("audio") => MediaFormat::Audio,
            _ => MediaFormat::Video,
        }
    }

    /// Extension of the file the extraction engine is expected to produce.
    pub fn output_extension(&self) -> &'static str {
        match self {
            MediaFormat::Audio => "mp3",
            MediaFormat::Video => "mp4",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaFormat::Audio => "audio/mpeg",
            MediaFormat::Video => "video/mp4",
        }
    }
}

/// Latest progress snapshot of a job. Overwritten on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobProgress {
    Queued,
    Started,
    Downloading {
        downloaded: u64,
        total: Option<u64>,
        percent: Option<f64>,
        eta: Option<u64>,
    },
    Finished,
}

impl JobProgress {
    /// Builds a downloading snapshot, deriving the percentage when the total is known.
    pub fn downloading(downloaded: u64, total: Option<u64>, eta: Option<u64>) -> Self {
        let percent = match total {
            Some(total) if total > 0 => Some(downloaded as f64 / total as f64 * 100.0),
            _ => None,
        };
        JobProgress::Downloading {
            downloaded,
            total,
            percent,
            eta,
        }
    }
}

/// Classified job failure, as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// The engine could not fetch the media (private, invalid or removed source).
    Extraction,
    /// The engine finished but no output was produced, or the transcoder is missing.
    OutputMissing,
    /// Anything else.
    Unexpected,
}

impl JobErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            JobErrorKind::Extraction => {
                "Failed to download media. The URL may be private or invalid."
            }
            JobErrorKind::OutputMissing => "ffmpeg not found or output missing.",
            JobErrorKind::Unexpected => "Unexpected server error during download.",
        }
    }
}

/// The file produced by a successful job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub filename: String,
    pub size: Option<u64>,
}

/// Request metadata retained for diagnostics. Never exposed to other clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    pub client_id: String,
    pub url: String,
    pub format: MediaFormat,
    pub has_cookies: bool,
    pub has_proxy: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Illegal job transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A single job tracked by the registry.
///
/// State fields are private so that `output` is present exactly when the status
/// is `Ready` and `error` exactly when it is `Error`.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub request: RequestMetadata,
    status: JobStatus,
    progress: JobProgress,
    temp_dir: Option<PathBuf>,
    output: Option<OutputFile>,
    error: Option<JobErrorKind>,
}

impl JobRecord {
    pub fn new(id: String, request: RequestMetadata) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            request,
            status: JobStatus::Queued,
            progress: JobProgress::Queued,
            temp_dir: None,
            output: None,
            error: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> &JobProgress {
        &self.progress
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub fn output(&self) -> Option<&OutputFile> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<JobErrorKind> {
        self.error
    }

    /// `Queued -> Running`. The temp dir is assigned once and never replaced.
    pub fn start(&mut self, temp_dir: PathBuf) -> Result<(), TransitionError> {
        self.check_transition(JobStatus::Queued, JobStatus::Running)?;
        if self.temp_dir.is_none() {
            self.temp_dir = Some(temp_dir);
        }
        self.status = JobStatus::Running;
        self.progress = JobProgress::Started;
        Ok(())
    }

    /// Overwrites the progress snapshot. Ignored once the job is terminal.
    pub fn set_progress(&mut self, progress: JobProgress) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.progress = progress;
        true
    }

    /// `Running -> Ready`.
    pub fn complete(&mut self, output: OutputFile) -> Result<(), TransitionError> {
        self.check_transition(JobStatus::Running, JobStatus::Ready)?;
        self.status = JobStatus::Ready;
        self.output = Some(output);
        Ok(())
    }

    /// Any non-terminal state -> `Error`.
    pub fn fail(&mut self, kind: JobErrorKind) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                from: self.status,
                to: JobStatus::Error,
            });
        }
        self.status = JobStatus::Error;
        self.error = Some(kind);
        Ok(())
    }

    fn check_transition(&self, expected: JobStatus, to: JobStatus) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

/// Client-facing view of a job, as pushed on the events stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// One of the job statuses, or `"unknown"` for ids not in the registry.
    pub status: String,
    pub progress: Option<JobProgress>,
    pub error: Option<String>,
    pub filename: Option<String>,
    pub size: Option<u64>,
}

impl JobSnapshot {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self {
            status: Self::UNKNOWN.to_string(),
            progress: None,
            error: None,
            filename: None,
            size: None,
        }
    }

    /// True once no further change can be observed for this job.
    pub fn is_final(&self) -> bool {
        matches!(self.status.as_str(), "ready" | "error" | "unknown")
    }
}

impl From<&JobRecord> for JobSnapshot {
    fn from(record: &JobRecord) -> Self {
        Self {
            status: record.status.as_str().to_string(),
            progress: Some(record.progress.clone()),
            error: record.error.map(|kind| kind.message().to_string()),
            filename: record.output.as_ref().map(|o| o.filename.clone()),
            size: record.output.as_ref().and_then(|o| o.size),
        }
    }
}
