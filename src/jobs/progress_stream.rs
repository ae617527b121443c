//! Live progress feed for a single job.
//!
//! Every open connection gets its own polling loop over the registry. A
//! snapshot is emitted only when its serialized form differs from the last one
//! sent, and the feed ends right after a `ready`, `error` or `unknown` snapshot.

use futures::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;

use super::models::JobSnapshot;
use super::registry::JobRegistry;

struct PollState {
    registry: Arc<JobRegistry>,
    job_id: String,
    interval: Duration,
    last_sent: Option<String>,
    polled_once: bool,
    finished: bool,
}

/// Serialized snapshot changes for `job_id`, polled every `interval`.
///
/// The first poll happens immediately.
pub fn job_progress_stream(
    registry: Arc<JobRegistry>,
    job_id: String,
    interval: Duration,
) -> impl Stream<Item = String> + Send + 'static {
    let state = PollState {
        registry,
        job_id,
        interval,
        last_sent: None,
        polled_once: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        loop {
            if state.polled_once {
                tokio::time::sleep(state.interval).await;
            }
            state.polled_once = true;

            let snapshot = state.registry.snapshot(&state.job_id);
            let payload = match serde_json::to_string(&snapshot) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::error!("Failed to serialize snapshot of {}: {}", state.job_id, err);
                    state.finished = true;
                    return Some((unknown_payload(), state));
                }
            };

            if state.last_sent.as_deref() == Some(payload.as_str()) {
                continue;
            }

            state.finished = snapshot.is_final();
            state.last_sent = Some(payload.clone());
            return Some((payload, state));
        }
    })
}

fn unknown_payload() -> String {
    serde_json::to_string(&JobSnapshot::unknown())
        .unwrap_or_else(|_| r#"{"status":"unknown"}"#.to_string())
}
