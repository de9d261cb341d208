//! Cooperative cancellation for batch retrieval.
//!
//! A [`CancellationToken`] is a cheap, cloneable handle. Tasks check it at
//! loop boundaries and race it against sleeps and network calls. A token made
//! with [`CancellationToken::child_token`] observes its parents as well as its
//! own flag, so the worker pool can cancel its batch on deadline without
//! touching the process-wide Ctrl+C token.

use futures::future::select_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Signal {
    fn fire(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    fn is_set(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Shared cancellation flag with async notification.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    // lineage[0] is this token's own signal, the rest are ancestors
    lineage: Vec<Arc<Signal>>,
}

impl CancellationToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self {
            lineage: vec![Arc::new(Signal::default())],
        }
    }

    /// Create a token that is cancelled when either it or `self` is cancelled.
    ///
    /// Cancelling the child does not affect `self`.
    pub fn child_token(&self) -> Self {
        let mut lineage = Vec::with_capacity(self.lineage.len() + 1);
        lineage.push(Arc::new(Signal::default()));
        lineage.extend(self.lineage.iter().cloned());
        Self { lineage }
    }

    /// Request cancellation. Wakes every waiter exactly once.
    pub fn cancel(&self) {
        self.lineage[0].fire();
    }

    /// Whether this token or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.lineage.iter().any(|signal| signal.is_set())
    }

    /// Wait until cancellation is requested. Returns immediately if already set.
    pub async fn cancelled(&self) {
        let mut waiters: Vec<_> = self
            .lineage
            .iter()
            .map(|signal| Box::pin(signal.notify.notified()))
            .collect();

        // Register interest before checking the flag so a cancel() landing
        // between the check and the await is not missed.
        for waiter in waiters.iter_mut() {
            waiter.as_mut().enable();
        }
        if self.is_cancelled() {
            return;
        }

        select_all(waiters).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
