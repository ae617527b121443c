//! Scripted extraction engine for end-to-end tests
//!
//! Stands in for yt-dlp so tests control whether a job produces a file,
//! fails, or stays running until released.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;

use instaweb_server::extractor::{
    ExtractionError, ExtractionRequest, MediaExtractor, ProgressReporter, ProgressUpdate,
};

use super::constants::*;

#[derive(Clone)]
pub enum ExtractorScript {
    /// Report some progress and write the expected output file.
    Produce,
    /// Exit with a download failure and no output.
    Fail,
    /// Stay running until the notify fires, then behave like `Produce`.
    HoldUntil(Arc<Notify>),
}

pub struct ScriptedExtractor {
    script: ExtractorScript,
}

impl ScriptedExtractor {
    pub fn new(script: ExtractorScript) -> Self {
        Self { script }
    }

    async fn produce(
        request: &ExtractionRequest,
        progress: &Arc<dyn ProgressReporter>,
    ) -> Result<(), ExtractionError> {
        let total = PRODUCED_MEDIA_BYTES.len() as u64;
        progress.report(ProgressUpdate::Downloading {
            downloaded: total / 2,
            total: Some(total),
            eta: Some(1),
        });

        let dir = request
            .output_template
            .parent()
            .expect("output template has a parent directory");
        let path = dir.join(format!(
            "{}.{}",
            PRODUCED_MEDIA_ID,
            request.format.output_extension()
        ));
        tokio::fs::write(&path, PRODUCED_MEDIA_BYTES).await?;

        progress.report(ProgressUpdate::Finished);
        Ok(())
    }
}

#[async_trait]
impl MediaExtractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(
        &self,
        request: ExtractionRequest,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<(), ExtractionError> {
        match &self.script {
            ExtractorScript::Produce => Self::produce(&request, &progress).await,
            ExtractorScript::Fail => Err(ExtractionError::DownloadFailed(
                "ERROR: [Instagram] ABC123: Requested content is not available".to_string(),
            )),
            ExtractorScript::HoldUntil(release) => {
                progress.report(ProgressUpdate::Downloading {
                    downloaded: 0,
                    total: None,
                    eta: None,
                });
                release.notified().await;
                Self::produce(&request, &progress).await
            }
        }
    }
}
