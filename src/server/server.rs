use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;

use axum::{
    middleware,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};

use super::job_routes::{download_job, job_events, start_job};
use super::{log_requests, state::*, ServerConfig};
use crate::jobs::{ClientRateLimiter, JobRegistry, JobRunner};

const LANDING_PAGE: &str = include_str!("../../static/index.html");

async fn home() -> impl IntoResponse {
    Html(LANDING_PAGE)
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        registry: Arc<JobRegistry>,
        rate_limiter: Arc<ClientRateLimiter>,
        runner: Arc<JobRunner>,
    ) -> ServerState {
        ServerState {
            config,
            registry,
            rate_limiter,
            runner,
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let job_routes: Router = Router::new()
        .route("/start", post(start_job))
        .route("/events/{job_id}", get(job_events))
        .route("/download/{job_id}", get(download_job))
        .with_state(state.clone());

    let home_router: Router = match &state.config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)),
    };

    home_router
        .merge(job_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

/// Serves until `shutdown` resolves, then drains open connections.
pub async fn run_server(
    config: ServerConfig,
    registry: Arc<JobRegistry>,
    rate_limiter: Arc<ClientRateLimiter>,
    runner: Arc<JobRunner>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let address = format!("{}:{}", config.host, config.port);
    let state = ServerState::new(config, registry, rate_limiter, runner);
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Ready to serve at {}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}
