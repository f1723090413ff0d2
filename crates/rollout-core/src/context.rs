//! Cancellation plumbing shared by every blocking call in the pipeline.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Carried through a single pipeline execution so that lock acquisition,
/// node RPCs, and health-check sleeps all observe the same cancellation
/// signal (spec: "every blocking call takes a context; cancellation
/// propagates").
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when either `duration` elapses or the context is cancelled.
    /// Returns `true` if cancellation fired first.
    pub async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.cancel.cancelled() => true,
        }
    }

    /// Races `fut` against cancellation, returning `None` if cancelled first.
    pub async fn race<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            out = fut => Some(out),
            _ = self.cancel.cancelled() => None,
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
