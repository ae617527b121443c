//! Job API routes: start a job, follow its progress, fetch its output.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Response,
    },
    Json,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::client_id::ClientId;
use super::error::ApiError;
use super::state::{GuardedJobRegistry, ServerState};
use super::url_validation::is_supported_url;
use crate::jobs::{
    job_progress_stream, JobRecord, JobRequest, JobStatus, MediaFormat, RequestMetadata,
};

const HEADER_API_KEY: &str = "x-api-key";

/// Body of `POST /start`. Every field is optional at the wire level.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StartJobBody {
    url: Option<String>,
    format: Option<String>,
    cookies: Option<String>,
    proxy: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_authorized(expected: Option<&str>, headers: &HeaderMap, body_key: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let provided = headers
        .get(HEADER_API_KEY)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .or(body_key);
    provided == Some(expected)
}

pub(super) async fn start_job(
    State(state): State<ServerState>,
    ClientId(client_id): ClientId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StartJobResponse>, ApiError> {
    // Malformed or missing JSON is treated like an empty object.
    let body: StartJobBody = serde_json::from_slice(&body).unwrap_or_default();

    if !is_authorized(
        state.config.api_key.as_deref(),
        &headers,
        body.api_key.as_deref(),
    ) {
        return Err(ApiError::Unauthorized);
    }

    let url = match body.url.map(|url| url.trim().to_string()) {
        Some(url) if is_supported_url(&url) => url,
        _ => return Err(ApiError::InvalidRequest("Invalid Instagram URL".to_string())),
    };

    let max_active = state.config.max_active_jobs_per_client;
    if max_active > 0 && state.registry.count_active_for_client(&client_id) >= max_active {
        info!(
            "Rejecting job from {}: {} jobs already in flight",
            client_id, max_active
        );
        return Err(ApiError::RateLimited);
    }

    if !state.rate_limiter.admit(&client_id) {
        info!("Rejecting job from {}: rate limit exceeded", client_id);
        return Err(ApiError::RateLimited);
    }

    let format = MediaFormat::from_request(body.format.as_deref());
    let cookies = non_empty(body.cookies);
    let proxy = non_empty(body.proxy);

    let job_id = uuid::Uuid::new_v4().simple().to_string();
    let record = JobRecord::new(
        job_id.clone(),
        RequestMetadata {
            client_id: client_id.clone(),
            url: url.clone(),
            format,
            has_cookies: cookies.is_some(),
            has_proxy: proxy.is_some(),
        },
    );
    state
        .registry
        .create(record)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(
        "Accepted job {} from {} ({:?}): {}",
        job_id, client_id, format, url
    );
    state.runner.dispatch(JobRequest {
        job_id: job_id.clone(),
        url,
        format,
        cookies,
        proxy,
    });

    Ok(Json(StartJobResponse { job_id }))
}

pub(super) async fn job_events(
    State(state): State<ServerState>,
    Path(job_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Opening events stream for job {}", job_id);
    let stream = job_progress_stream(
        state.registry.clone(),
        job_id,
        state.config.events_poll_interval,
    )
    .map(|payload| Ok(Event::default().data(payload)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

pub(super) async fn download_job(
    State(registry): State<GuardedJobRegistry>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job = registry
        .get(&job_id)
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    let output = match (job.status(), job.output()) {
        (JobStatus::Ready, Some(output)) => output.clone(),
        _ => return Err(ApiError::NotReady("File not ready".to_string())),
    };

    let file = match File::open(&output.path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File not found".to_string()));
        }
        Err(e) => {
            return Err(ApiError::Internal(format!(
                "Failed to open {:?}: {}",
                output.path, e
            )))
        }
    };

    let mut response = axum::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&output.filename))
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&output.filename),
        );
    if let Ok(metadata) = file.metadata().await {
        response = response.header(header::CONTENT_LENGTH, metadata.len());
    }

    debug!("Serving {:?} for job {}", output.path, job_id);
    response
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

fn content_type_for(filename: &str) -> &'static str {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp3") => MediaFormat::Audio.content_type(),
        Some("mp4") => MediaFormat::Video.content_type(),
        _ => "application/octet-stream",
    }
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// in RFC 5987 form.
fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
