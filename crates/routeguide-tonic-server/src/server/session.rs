//! Admission and drain of in-flight calls.
//!
//! Every call registers with the [`SessionTracker`] before doing any work and
//! holds a [`SessionGuard`] until it finishes. Shutdown runs in phases:
//!
//! 1. Refuse new calls with [`Error::ServiceShutdown`].
//! 2. Wait up to the configured timeout for in-flight calls to finish.
//! 3. Cancel whatever is left through the shared [`CancellationToken`].

use crate::server::telemetry::{decrement_calls_inflight, increment_calls_inflight};
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use routeguide_tonic_core::Error;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

pub struct SessionTracker {
    inflight: AtomicUsize,
    shutting_down: AtomicBool,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl SessionTracker {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            inflight: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Registers a new call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has started.
    pub fn begin(self: &Arc<Self>) -> Result<SessionGuard, Error> {
        // Count first, then check: a drain that observes zero can never miss a
        // call that was admitted.
        self.inflight.fetch_add(1, Ordering::SeqCst);
        if self.shutting_down.load(Ordering::SeqCst) {
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::ServiceShutdown);
        }

        increment_calls_inflight();
        Ok(SessionGuard {
            tracker: Arc::clone(self),
            cancel: self.shutdown_token.child_token(),
        })
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Stops admitting calls, drains in-flight ones, then cancels the rest.
    pub async fn shutdown(&self) {
        // === Phase 1: Stop accepting new calls ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new calls");
        self.shutting_down.store(true, Ordering::SeqCst);

        // === Phase 2: Wait for in-flight calls to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        let drained = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight calls drained");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} calls still active)",
                    self.inflight()
                );
            }
        }

        // === Phase 3: Cancel any remaining work ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining calls via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Keeps a call counted as in flight until dropped.
pub struct SessionGuard {
    tracker: Arc<SessionTracker>,
    cancel: CancellationToken,
}

impl SessionGuard {
    /// Token that fires when shutdown gives up waiting for this call.
    pub fn cancelled_on_shutdown(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.tracker.inflight.fetch_sub(1, Ordering::SeqCst);
        decrement_calls_inflight();
    }
}
