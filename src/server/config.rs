use super::RequestsLoggingLevel;
use std::time::Duration;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub host: String,
    pub port: u16,
    pub frontend_dir_path: Option<String>,
    /// When set, `/start` requires this key in `X-API-Key` or the body.
    pub api_key: Option<String>,
    /// How often an open events stream re-reads its job.
    pub events_poll_interval: Duration,
    /// Non-terminal jobs a single client may own at once. 0 disables the ceiling.
    pub max_active_jobs_per_client: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            host: "127.0.0.1".to_string(),
            port: 5000,
            frontend_dir_path: None,
            api_key: None,
            events_poll_interval: Duration::from_millis(500),
            max_active_jobs_per_client: 3,
        }
    }
}
