//! Cooperative abort signal.

use std::sync::Arc;

use tokio::sync::watch;

/// Level-triggered abort flag shared between a task and whoever stops it.
///
/// Once triggered it stays triggered. Bodies either poll [`is_aborted`] between
/// steps or race their work against [`aborted`] in a `select!`.
///
/// [`is_aborted`]: AbortSignal::is_aborted
/// [`aborted`]: AbortSignal::aborted
#[derive(Debug, Clone)]
pub struct AbortSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal. Returns `true` if this call raised it.
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal is raised.
    pub async fn aborted(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}
