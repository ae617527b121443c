//! Media extraction engine interface.
//!
//! The engine fetches (and optionally transcodes) media for a single job and
//! reports progress synchronously through a [`ProgressReporter`].

mod ytdlp;

pub use ytdlp::{parse_progress_line, YtDlpExtractor, PROGRESS_TEMPLATE};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::jobs::MediaFormat;

/// Errors that can occur while running the extraction engine.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The engine ran and reported that the media could not be fetched.
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// The engine needed the transcoder and could not find it.
    #[error("transcoder unavailable: {0}")]
    TranscoderUnavailable(String),

    /// The engine binary could not be started.
    #[error("failed to launch extraction engine: {0}")]
    Launch(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single invocation of the engine.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub url: String,
    pub format: MediaFormat,
    /// Output path template, scoped to the job's temp dir.
    pub output_template: PathBuf,
    /// Netscape-format cookie file for the engine.
    pub cookies_file: Option<PathBuf>,
    pub proxy: Option<String>,
}

/// Progress phases reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    Downloading {
        downloaded: u64,
        total: Option<u64>,
        eta: Option<u64>,
    },
    Finished,
    /// Any phase the engine reports that we do not track.
    Other(String),
}

/// Receives progress from the engine. Called from the engine's own context,
/// so implementations must return quickly and never block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Human-readable name, for logs.
    fn name(&self) -> &str;

    /// Runs the engine once for `request`, returning when it exits.
    async fn extract(
        &self,
        request: ExtractionRequest,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<(), ExtractionError>;
}
