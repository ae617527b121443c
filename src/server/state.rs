use axum::extract::FromRef;
use std::sync::Arc;

use crate::jobs::{ClientRateLimiter, JobRegistry, JobRunner};

use super::ServerConfig;

pub type GuardedJobRegistry = Arc<JobRegistry>;
pub type GuardedRateLimiter = Arc<ClientRateLimiter>;
pub type GuardedJobRunner = Arc<JobRunner>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub registry: GuardedJobRegistry,
    pub rate_limiter: GuardedRateLimiter,
    pub runner: GuardedJobRunner,
}

impl FromRef<ServerState> for GuardedJobRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.registry.clone()
    }
}
