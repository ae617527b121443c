use crate::jobs::JobRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Download job registry, for evicting records whose artifacts are gone.
    pub registry: Arc<JobRegistry>,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, registry: Arc<JobRegistry>) -> Self {
        Self {
            cancellation_token,
            registry,
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Same context with a child token, so a single run can be cancelled alone.
    pub fn child(&self) -> Self {
        Self {
            cancellation_token: self.cancellation_token.child_token(),
            registry: Arc::clone(&self.registry),
        }
    }
}
