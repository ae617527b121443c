//! End-to-end tests for fetching job output
//!
//! Tests GET /download/{job_id} before, during and after a job runs.

mod common;

use common::{
    ExtractorScript, TestClient, TestServer, TestServerOptions, PRODUCED_MEDIA_BYTES, VALID_URL,
};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::test]
async fn test_download_unknown_job_returns_404() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.download("nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Job not found");
}

#[tokio::test]
async fn test_download_running_job_is_not_ready() {
    let release = Arc::new(Notify::new());
    let server = TestServer::spawn_with(TestServerOptions {
        script: ExtractorScript::HoldUntil(release.clone()),
        ..Default::default()
    })
    .await;
    let client = TestClient::new(server.base_url.clone());

    let job_id = client.start_job(VALID_URL).await;

    let response = client.download(&job_id).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "File not ready");

    release.notify_one();
    server.wait_for_terminal(&job_id).await;

    let response = client.download(&job_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().as_ref(), PRODUCED_MEDIA_BYTES);
}

#[tokio::test]
async fn test_download_ready_video() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let job_id = client.start_job(VALID_URL).await;
    server.wait_for_terminal(&job_id).await;

    let response = client.download(&job_id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "video/mp4");
    let disposition = headers
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("ABC123.mp4"));

    assert_eq!(response.bytes().await.unwrap().as_ref(), PRODUCED_MEDIA_BYTES);
}

#[tokio::test]
async fn test_download_ready_audio() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .start_with_body(json!({ "url": VALID_URL, "format": "audio" }))
        .await;
    let body: Value = response.json().await.unwrap();
    let job_id = body["job_id"].as_str().unwrap().to_string();
    server.wait_for_terminal(&job_id).await;

    let response = client.download(&job_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "audio/mpeg");
}

#[tokio::test]
async fn test_download_failed_job_is_not_ready() {
    let server = TestServer::spawn_with(TestServerOptions {
        script: ExtractorScript::Fail,
        ..Default::default()
    })
    .await;
    let client = TestClient::new(server.base_url.clone());

    let job_id = client.start_job(VALID_URL).await;
    server.wait_for_terminal(&job_id).await;

    let response = client.download(&job_id).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_after_artifact_removed_returns_404() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let job_id = client.start_job(VALID_URL).await;
    server.wait_for_terminal(&job_id).await;

    std::fs::remove_dir_all(server.downloads_dir.path().join(&job_id)).unwrap();

    let response = client.download(&job_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "File not found");
}

#[tokio::test]
async fn test_default_cookies_are_written_for_job() {
    let server = TestServer::spawn_with(TestServerOptions {
        default_cookies: Some("# Netscape HTTP Cookie File\n".to_string()),
        ..Default::default()
    })
    .await;
    let client = TestClient::new(server.base_url.clone());

    let job_id = client.start_job(VALID_URL).await;
    server.wait_for_terminal(&job_id).await;

    let cookies = server
        .downloads_dir
        .path()
        .join(&job_id)
        .join("cookies.txt");
    assert_eq!(
        std::fs::read_to_string(cookies).unwrap(),
        "# Netscape HTTP Cookie File\n"
    );
}

#[tokio::test]
async fn test_home_serves_landing_page() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.home().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("<html"));
}
