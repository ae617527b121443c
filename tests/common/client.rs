//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per server endpoint. When routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Sent as `X-Forwarded-For`, so tests can act as distinct clients
    pub forwarded_for: Option<String>,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            forwarded_for: None,
        }
    }

    /// A client identified by the given forwarded address.
    pub fn forwarded_as(base_url: String, address: &str) -> Self {
        let mut client = Self::new(base_url);
        client.forwarded_for = Some(address.to_string());
        client
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(format!("{}{}", self.base_url, path));
        match &self.forwarded_for {
            Some(address) => builder.header("X-Forwarded-For", address),
            None => builder,
        }
    }

    // ========================================================================
    // Job Endpoints
    // ========================================================================

    /// POST /start with just a URL
    pub async fn start(&self, url: &str) -> Response {
        self.start_with_body(json!({ "url": url })).await
    }

    /// POST /start with an arbitrary JSON body
    pub async fn start_with_body(&self, body: Value) -> Response {
        self.post("/start")
            .json(&body)
            .send()
            .await
            .expect("Start request failed")
    }

    /// POST /start with the API key in the `X-API-Key` header
    pub async fn start_with_key(&self, url: &str, api_key: &str) -> Response {
        self.post("/start")
            .header("X-API-Key", api_key)
            .json(&json!({ "url": url }))
            .send()
            .await
            .expect("Start request failed")
    }

    /// POST /start with a raw, possibly malformed, body
    pub async fn start_raw(&self, body: &'static str) -> Response {
        self.post("/start")
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Start request failed")
    }

    /// Starts a job and returns its id, asserting the request was accepted.
    pub async fn start_job(&self, url: &str) -> String {
        let response = self.start(url).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Start request rejected"
        );
        let body: Value = response.json().await.expect("Invalid start response");
        body["job_id"]
            .as_str()
            .expect("Missing job_id")
            .to_string()
    }

    /// GET /events/{job_id}
    pub async fn events(&self, job_id: &str) -> Response {
        self.client
            .get(format!("{}/events/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Events request failed")
    }

    /// Reads an events stream to its end and returns the `data:` payloads.
    pub async fn collect_events(&self, job_id: &str) -> Vec<Value> {
        let body = self
            .events(job_id)
            .await
            .text()
            .await
            .expect("Failed to read events stream");
        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).expect("Event is not JSON"))
            .collect()
    }

    /// GET /download/{job_id}
    pub async fn download(&self, job_id: &str) -> Response {
        self.client
            .get(format!("{}/download/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Download request failed")
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }
}
