use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use instaweb_server::background_jobs::jobs::{ExtractorUpdateJob, RetentionSweepJob};
use instaweb_server::background_jobs::{JobContext, JobScheduler};
use instaweb_server::config::{self, parse_toggle};
use instaweb_server::extractor::{MediaExtractor, YtDlpExtractor};
use instaweb_server::jobs::{ClientRateLimiter, JobRegistry, JobRunner, RunnerSettings};
use instaweb_server::server::{run_server, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The address to bind.
    #[clap(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to a frontend directory to be statically served instead of the built-in page.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Root directory for per-job temporary artifacts.
    #[clap(long, env = "DOWNLOADS_DIR", default_value = "downloads", value_parser = parse_path)]
    pub downloads_dir: PathBuf,

    /// Static API key required by POST /start. Unset or empty disables the check.
    #[clap(long, env = "INSTAWEB_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// How often an open events stream polls its job, in milliseconds.
    #[clap(long, default_value_t = 500)]
    pub events_poll_interval_ms: u64,

    /// Jobs a client may start inside one rate limit window.
    #[clap(long, env = "RATE_LIMIT_COUNT", default_value_t = 5)]
    pub rate_limit_count: usize,

    /// Length of the rate limit window in seconds.
    #[clap(long, env = "RATE_LIMIT_WINDOW", default_value_t = 3600)]
    pub rate_limit_window: u64,

    /// Unfinished jobs a client may own at once. 0 disables the ceiling.
    #[clap(long, env = "RATE_LIMIT_CONCURRENT", default_value_t = 3)]
    pub rate_limit_concurrent: usize,

    /// Age in seconds after which job artifacts and records are swept.
    #[clap(long, default_value_t = 30 * 60)]
    pub retention_max_age_sec: u64,

    /// Seconds between retention sweeps.
    #[clap(long, default_value_t = 60)]
    pub sweep_interval_sec: u64,

    /// The yt-dlp executable.
    #[clap(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    pub ytdlp_path: PathBuf,

    /// The ffmpeg executable (or its directory) handed to yt-dlp.
    #[clap(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: String,

    /// Netscape-format cookie blob used when a request carries no cookies.
    #[clap(long, env = "INSTAGRAM_COOKIES", hide_env_values = true)]
    pub default_cookies: Option<String>,

    /// Periodically run `yt-dlp -U` (1, true or yes to enable).
    #[clap(long, env = "YTDLP_AUTO_UPDATE", default_value = "false", value_parser = parse_toggle, action = clap::ArgAction::Set)]
    pub ytdlp_auto_update: bool,

    /// Minutes between yt-dlp update checks.
    #[clap(long, env = "YTDLP_UPDATE_INTERVAL_MIN", default_value_t = 60)]
    pub ytdlp_update_interval_min: u64,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            host: args.host.clone(),
            port: args.port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            downloads_dir: args.downloads_dir.clone(),
            api_key: args.api_key.clone(),
            events_poll_interval_ms: args.events_poll_interval_ms,
            rate_limit_count: args.rate_limit_count,
            rate_limit_window_sec: args.rate_limit_window,
            rate_limit_concurrent: args.rate_limit_concurrent,
            retention_max_age_sec: args.retention_max_age_sec,
            sweep_interval_sec: args.sweep_interval_sec,
            ytdlp_path: args.ytdlp_path.clone(),
            ffmpeg_path: args.ffmpeg_path.clone(),
            default_cookies: args.default_cookies.clone(),
            ytdlp_auto_update: args.ytdlp_auto_update,
            ytdlp_update_interval_min: args.ytdlp_update_interval_min,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  downloads_dir: {:?}", app_config.downloads_dir);
    info!(
        "  rate limit: {} per {:?}, {} concurrent",
        app_config.rate_limit.count, app_config.rate_limit.window, app_config.rate_limit.concurrent
    );
    info!("  api key required: {}", app_config.api_key.is_some());
    info!(
        "  default cookies: {}",
        app_config.extractor.default_cookies.is_some()
    );

    std::fs::create_dir_all(&app_config.downloads_dir).with_context(|| {
        format!(
            "Failed to create downloads directory {:?}",
            app_config.downloads_dir
        )
    })?;

    let registry = Arc::new(JobRegistry::new());
    let rate_limiter = Arc::new(ClientRateLimiter::new(
        app_config.rate_limit.limiter_config(),
    ));

    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlpExtractor::new(
        app_config.extractor.ytdlp_path.clone(),
        app_config.extractor.ffmpeg_path.clone(),
    ));
    info!("Extraction engine: {}", extractor.name());
    let runner = Arc::new(JobRunner::new(
        registry.clone(),
        extractor,
        RunnerSettings {
            downloads_dir: app_config.downloads_dir.clone(),
            default_cookies: app_config.extractor.default_cookies.clone(),
        },
    ));

    // Set up background job scheduler
    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(shutdown_token.child_token(), registry.clone());
    let mut scheduler = JobScheduler::new(shutdown_token.clone(), job_context);
    scheduler.register_job(Arc::new(RetentionSweepJob::new(
        app_config.downloads_dir.clone(),
        app_config.retention.max_age,
        app_config.retention.sweep_interval,
    )));
    if app_config.extractor.auto_update {
        scheduler.register_job(Arc::new(ExtractorUpdateJob::new(
            app_config.extractor.ytdlp_path.clone(),
            app_config.extractor.update_interval_min,
        )));
    }
    let scheduler_task = tokio::spawn(scheduler.run());

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        host: app_config.host.clone(),
        port: app_config.port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        api_key: app_config.api_key.clone(),
        events_poll_interval: app_config.events_poll_interval,
        max_active_jobs_per_client: app_config.rate_limit.concurrent,
    };

    let server_shutdown = shutdown_token.clone();
    let result = run_server(server_config, registry, rate_limiter, runner, async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
            _ = server_shutdown.cancelled() => {}
        }
    })
    .await;

    info!("HTTP server stopped: {:?}", result);
    shutdown_token.cancel();
    let _ = scheduler_task.await;
    result
}
