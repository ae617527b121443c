mod file_config;

pub use file_config::{ExtractorFileConfig, FileConfig, RateLimitFileConfig, RetentionFileConfig};

use crate::jobs::RateLimitConfig;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub host: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub downloads_dir: PathBuf,
    pub api_key: Option<String>,
    pub events_poll_interval_ms: u64,
    pub rate_limit_count: usize,
    pub rate_limit_window_sec: u64,
    pub rate_limit_concurrent: usize,
    pub retention_max_age_sec: u64,
    pub sweep_interval_sec: u64,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: String,
    pub default_cookies: Option<String>,
    pub ytdlp_auto_update: bool,
    pub ytdlp_update_interval_min: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            logging_level: RequestsLoggingLevel::Path,
            frontend_dir_path: None,
            downloads_dir: PathBuf::from("downloads"),
            api_key: None,
            events_poll_interval_ms: 500,
            rate_limit_count: 5,
            rate_limit_window_sec: 3600,
            rate_limit_concurrent: 3,
            retention_max_age_sec: 30 * 60,
            sweep_interval_sec: 60,
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: "ffmpeg".to_string(),
            default_cookies: None,
            ytdlp_auto_update: false,
            ytdlp_update_interval_min: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub host: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub downloads_dir: PathBuf,
    pub api_key: Option<String>,
    pub events_poll_interval: Duration,

    // Feature configs
    pub rate_limit: RateLimitSettings,
    pub retention: RetentionSettings,
    pub extractor: ExtractorSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub count: usize,
    pub window: Duration,
    /// Non-terminal jobs a single client may own at once. 0 disables the ceiling.
    pub concurrent: usize,
}

impl RateLimitSettings {
    pub fn limiter_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.count,
            window: self.window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionSettings {
    pub max_age: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorSettings {
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: String,
    pub default_cookies: Option<String>,
    pub auto_update: bool,
    pub update_interval_min: u64,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);

        let logging_level = match file.logging_level {
            Some(s) => match parse_logging_level(&s) {
                Some(level) => level,
                None => bail!("Invalid logging_level in config file: {}", s),
            },
            None => cli.logging_level.clone(),
        };

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());
        let downloads_dir = file
            .downloads_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.downloads_dir.clone());
        if downloads_dir.exists() && !downloads_dir.is_dir() {
            bail!("downloads_dir is not a directory: {:?}", downloads_dir);
        }

        let api_key = non_empty(file.api_key.or_else(|| cli.api_key.clone()));

        let events_poll_interval_ms = file
            .events_poll_interval_ms
            .unwrap_or(cli.events_poll_interval_ms);
        if events_poll_interval_ms == 0 {
            bail!("events_poll_interval_ms must be greater than 0");
        }

        let rl_file = file.rate_limit.unwrap_or_default();
        let rate_limit = RateLimitSettings {
            count: rl_file.count.unwrap_or(cli.rate_limit_count),
            window: Duration::from_secs(rl_file.window_sec.unwrap_or(cli.rate_limit_window_sec)),
            concurrent: rl_file.concurrent.unwrap_or(cli.rate_limit_concurrent),
        };
        if rate_limit.window.is_zero() {
            bail!("Rate limit window must be greater than 0 seconds");
        }

        let retention_file = file.retention.unwrap_or_default();
        let retention = RetentionSettings {
            max_age: Duration::from_secs(
                retention_file
                    .max_age_sec
                    .unwrap_or(cli.retention_max_age_sec),
            ),
            sweep_interval: Duration::from_secs(
                retention_file
                    .sweep_interval_sec
                    .unwrap_or(cli.sweep_interval_sec),
            ),
        };
        if retention.sweep_interval.is_zero() {
            bail!("Sweep interval must be greater than 0 seconds");
        }

        let ex_file = file.extractor.unwrap_or_default();
        let extractor = ExtractorSettings {
            ytdlp_path: ex_file
                .ytdlp_path
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.ytdlp_path.clone()),
            ffmpeg_path: ex_file
                .ffmpeg_path
                .unwrap_or_else(|| cli.ffmpeg_path.clone()),
            default_cookies: non_empty(
                ex_file
                    .default_cookies
                    .or_else(|| cli.default_cookies.clone()),
            ),
            auto_update: ex_file.auto_update.unwrap_or(cli.ytdlp_auto_update),
            update_interval_min: ex_file
                .update_interval_min
                .unwrap_or(cli.ytdlp_update_interval_min)
                .max(1),
        };

        Ok(Self {
            host,
            port,
            logging_level,
            frontend_dir_path,
            downloads_dir,
            api_key,
            events_poll_interval: Duration::from_millis(events_poll_interval_ms),
            rate_limit,
            retention,
            extractor,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

/// Blank strings count as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses an on/off environment toggle. Only `1`, `true` and `yes` switch it on.
pub fn parse_toggle(s: &str) -> Result<bool, String> {
    Ok(matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    ))
}
