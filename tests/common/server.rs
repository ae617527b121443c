//! Test server lifecycle management
//!
//! Each test gets its own server on a random port, backed by a scripted
//! extraction engine and a throwaway downloads directory.

use super::constants::*;
use super::extractor::{ExtractorScript, ScriptedExtractor};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use instaweb_server::extractor::MediaExtractor;
use instaweb_server::jobs::{
    ClientRateLimiter, JobRegistry, JobRunner, RateLimitConfig, RunnerSettings,
};
use instaweb_server::server::state::ServerState;
use instaweb_server::{make_app, RequestsLoggingLevel, ServerConfig};

/// Knobs for a test server. `Default` gives a permissive server.
#[derive(Clone)]
pub struct TestServerOptions {
    pub script: ExtractorScript,
    pub api_key: Option<String>,
    pub rate_limit_count: usize,
    pub rate_limit_window: Duration,
    pub max_active_jobs_per_client: usize,
    pub default_cookies: Option<String>,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            script: ExtractorScript::Produce,
            api_key: None,
            rate_limit_count: 100,
            rate_limit_window: Duration::from_secs(3600),
            max_active_jobs_per_client: 0,
            default_cookies: None,
        }
    }
}

/// A running test server instance
///
/// The server shuts down when this is dropped.
pub struct TestServer {
    /// Base URL for HTTP requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Port the server is listening on
    pub port: u16,

    /// Registry shared with the server, for inspecting job state
    pub registry: Arc<JobRegistry>,

    /// Downloads directory, cleaned up on drop
    pub downloads_dir: TempDir,

    _shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server whose extractor produces a file for every job.
    pub async fn spawn() -> Self {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawns a server configured by `options`.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started (indicates test infrastructure problem).
    pub async fn spawn_with(options: TestServerOptions) -> Self {
        let downloads_dir = TempDir::new().expect("Failed to create downloads dir");

        let registry = Arc::new(JobRegistry::new());
        let rate_limiter = Arc::new(ClientRateLimiter::new(RateLimitConfig {
            max_requests: options.rate_limit_count,
            window: options.rate_limit_window,
        }));
        let extractor: Arc<dyn MediaExtractor> =
            Arc::new(ScriptedExtractor::new(options.script.clone()));
        let runner = Arc::new(JobRunner::new(
            registry.clone(),
            extractor,
            RunnerSettings {
                downloads_dir: downloads_dir.path().to_path_buf(),
                default_cookies: options.default_cookies.clone(),
            },
        ));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            host: "127.0.0.1".to_string(),
            port,
            frontend_dir_path: None,
            api_key: options.api_key.clone(),
            events_poll_interval: Duration::from_millis(EVENTS_POLL_INTERVAL_MS),
            max_active_jobs_per_client: options.max_active_jobs_per_client,
        };
        let state = ServerState::new(config, registry.clone(), rate_limiter, runner);
        let app = make_app(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            registry,
            downloads_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// Waits for the server to accept requests
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::new();
        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Polls the registry until the job is ready or failed.
    ///
    /// # Panics
    ///
    /// Panics if the job does not settle within `JOB_SETTLE_TIMEOUT_MS`.
    pub async fn wait_for_terminal(&self, job_id: &str) {
        let start = Instant::now();
        let timeout = Duration::from_millis(JOB_SETTLE_TIMEOUT_MS);

        loop {
            let settled = self
                .registry
                .get(job_id)
                .map(|job| job.status().is_terminal())
                .unwrap_or(false);
            if settled {
                return;
            }
            if start.elapsed() > timeout {
                panic!("Job {} did not settle within {}ms", job_id, JOB_SETTLE_TIMEOUT_MS);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
