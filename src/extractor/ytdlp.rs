//! Extraction engine backed by the `yt-dlp` command line tool.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ExtractionError, ExtractionRequest, MediaExtractor, ProgressReporter, ProgressUpdate};
use crate::jobs::MediaFormat;

/// Makes yt-dlp print one machine-readable line per progress hook call.
pub const PROGRESS_TEMPLATE: &str = "download:PROGRESS|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.eta)s";

const PROGRESS_PREFIX: &str = "PROGRESS|";

/// Lines of stderr kept for error reporting.
const STDERR_TAIL_LINES: usize = 20;

const AUDIO_CODEC: &str = "mp3";
const AUDIO_QUALITY: &str = "192K";
const VIDEO_CONTAINER: &str = "mp4";

pub struct YtDlpExtractor {
    binary: PathBuf,
    ffmpeg_location: String,
}

impl YtDlpExtractor {
    /// # Arguments
    /// * `binary` - yt-dlp executable (name on PATH or full path)
    /// * `ffmpeg_location` - ffmpeg executable or directory handed to yt-dlp
    pub fn new(binary: impl Into<PathBuf>, ffmpeg_location: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg_location: ffmpeg_location.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn build_args(&self, request: &ExtractionRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--newline",
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            "--progress",
            "--progress-template",
            PROGRESS_TEMPLATE,
        ]
        .iter()
        .map(OsString::from)
        .collect();

        args.push("-o".into());
        args.push(request.output_template.clone().into_os_string());

        // A bare program name is resolved through PATH by yt-dlp itself;
        // --ffmpeg-location only accepts existing paths.
        if self.ffmpeg_location.contains(std::path::MAIN_SEPARATOR) {
            args.push("--ffmpeg-location".into());
            args.push(self.ffmpeg_location.clone().into());
        }

        match request.format {
            MediaFormat::Audio => {
                for arg in [
                    "-f",
                    "bestaudio/best",
                    "--extract-audio",
                    "--audio-format",
                    AUDIO_CODEC,
                    "--audio-quality",
                    AUDIO_QUALITY,
                ] {
                    args.push(arg.into());
                }
            }
            MediaFormat::Video => {
                for arg in [
                    "-f",
                    "bestvideo+bestaudio/best",
                    "--merge-output-format",
                    VIDEO_CONTAINER,
                ] {
                    args.push(arg.into());
                }
            }
        }

        if let Some(cookies) = &request.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.clone().into_os_string());
        }
        if let Some(proxy) = &request.proxy {
            args.push("--proxy".into());
            args.push(proxy.into());
        }

        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        request: ExtractionRequest,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<(), ExtractionError> {
        let args = self.build_args(&request);
        debug!("Running {:?} for {}", self.binary, request.url);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExtractionError::Launch)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stderr was not captured"))?;

        let stderr_task = tokio::spawn(collect_tail(stderr));

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(update) = parse_progress_line(&line) {
                progress.report(update);
            }
        }

        let status = child.wait().await?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        let error = classify_failure(status, &stderr_tail);
        warn!("yt-dlp exited with {}: {}", status, error);
        Err(error)
    }
}

async fn collect_tail<R: AsyncRead + Unpin>(reader: R) -> Vec<String> {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect()
}

/// Parses a line printed through [`PROGRESS_TEMPLATE`]. Other lines yield None.
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split('|');
    let status = fields.next()?.trim();

    match status {
        "downloading" => {
            let downloaded = parse_number(fields.next()).unwrap_or(0);
            let total = parse_number(fields.next());
            let estimate = parse_number(fields.next());
            let eta = parse_number(fields.next());
            Some(ProgressUpdate::Downloading {
                downloaded,
                total: total.or(estimate),
                eta,
            })
        }
        "finished" => Some(ProgressUpdate::Finished),
        other => Some(ProgressUpdate::Other(other.to_string())),
    }
}

/// yt-dlp prints `NA` for missing values and floats for estimates.
fn parse_number(field: Option<&str>) -> Option<u64> {
    field
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

fn classify_failure(status: ExitStatus, stderr_tail: &[String]) -> ExtractionError {
    let message = stderr_tail
        .iter()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr_tail.last())
        .cloned()
        .unwrap_or_else(|| format!("yt-dlp exited with {}", status));

    let transcoder_missing = stderr_tail.iter().any(|line| {
        let line = line.to_lowercase();
        (line.contains("ffmpeg") || line.contains("ffprobe"))
            && (line.contains("not found") || line.contains("not installed"))
    });

    if transcoder_missing {
        ExtractionError::TranscoderUnavailable(message)
    } else {
        ExtractionError::DownloadFailed(message)
    }
}
