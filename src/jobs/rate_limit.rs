//! Per-client admission control for new jobs.
//!
//! Sliding window: every admission is timestamped, and a client is rejected
//! once it has `max_requests` admissions younger than `window`. Entries expire
//! one by one as they age out.
//!
//! Client entries are never evicted, so memory grows with the number of
//! distinct clients seen during the process lifetime.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Configuration for the sliding window limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum admissions per client inside one window
    pub max_requests: usize,
    /// Length of the sliding window
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(60 * 60),
        }
    }
}

pub struct ClientRateLimiter {
    config: RateLimitConfig,
    admissions: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl ClientRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            admissions: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a new job request from `client_id`.
    pub fn admit(&self, client_id: &str) -> bool {
        self.admit_at(client_id, Instant::now())
    }

    /// Same as [`admit`](Self::admit) with an explicit clock reading.
    pub fn admit_at(&self, client_id: &str, now: Instant) -> bool {
        let mut admissions = self
            .admissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let timestamps = admissions.entry(client_id.to_string()).or_default();

        Self::prune_expired(timestamps, now, self.config.window);

        if timestamps.len() >= self.config.max_requests {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Admissions of `client_id` still inside the window.
    pub fn usage(&self, client_id: &str) -> usize {
        self.usage_at(client_id, Instant::now())
    }

    pub fn usage_at(&self, client_id: &str, now: Instant) -> usize {
        let admissions = self
            .admissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        admissions
            .get(client_id)
            .map(|timestamps| {
                timestamps
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.config.window)
                    .count()
            })
            .unwrap_or(0)
    }

    fn prune_expired(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = timestamps.front() {
            if now.saturating_duration_since(*front) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for ClientRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
