use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub host: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub downloads_dir: Option<String>,
    pub api_key: Option<String>,
    pub events_poll_interval_ms: Option<u64>,

    // Feature configs
    pub rate_limit: Option<RateLimitFileConfig>,
    pub retention: Option<RetentionFileConfig>,
    pub extractor: Option<ExtractorFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RateLimitFileConfig {
    pub count: Option<usize>,
    pub window_sec: Option<u64>,
    pub concurrent: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetentionFileConfig {
    pub max_age_sec: Option<u64>,
    pub sweep_interval_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExtractorFileConfig {
    pub ytdlp_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    /// Netscape-format cookie blob used when a request carries none.
    pub default_cookies: Option<String>,
    pub auto_update: Option<bool>,
    pub update_interval_min: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
