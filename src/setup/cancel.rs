//! Cooperative cancellation for setup runs.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result};

/// Cooperative cancellation flag shared between the signal handler and the
/// executor loop. Checked only at item boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Route SIGINT and SIGTERM to this token.
    ///
    /// The handler only flips the flag; the item in flight finishes before
    /// the executor stops. Can be installed once per process.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler is already installed or the OS refuses
    /// the registration.
    pub fn install_signal_handler(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("interrupt received, stopping after the current item");
            token.cancel();
        })
        .context("failed to install signal handler")
    }
}
