//! Deferred restart of a relay attempt
//!
//! After a fatal failure (name never resolved, destination collision, host
//! failure, target torn down) the relay can come back to the same source
//! stream later. A restart is a one-shot tokio task that sleeps for the
//! configured delay and then runs the engine's re-attach callback.
//!
//! Requests are not deduplicated: two failures for the same stream arm two
//! timers, and each fires on its own. Re-attaching to a stream the relay is
//! already listening to is a no-op in the engine, so the extra timer is
//! harmless.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::host::StreamId;

/// Handle to one armed restart
#[derive(Debug)]
pub struct RestartHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RestartHandle {
    /// Cancel the restart if it has not fired yet
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the task has finished (fired or cancelled)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Arms one-shot restart timers
///
/// Every armed restart hangs off a root token. [`cancel_all`] cancels the
/// root; [`reset`] installs a fresh one so the scheduler can be reused after
/// the application starts again.
///
/// [`cancel_all`]: RestartScheduler::cancel_all
/// [`reset`]: RestartScheduler::reset
#[derive(Debug)]
pub struct RestartScheduler {
    enabled: bool,
    delay: Duration,
    shutdown: Mutex<CancellationToken>,
}

impl RestartScheduler {
    /// Create a scheduler
    pub fn new(enabled: bool, delay: Duration) -> Self {
        Self {
            enabled,
            delay,
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    fn root(&self) -> MutexGuard<'_, CancellationToken> {
        self.shutdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether restarts are enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Delay before an armed restart fires
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm a restart for `stream`
    ///
    /// `on_expiry` runs after the delay unless the restart or the whole
    /// scheduler is cancelled first. Returns `None` when restarts are
    /// disabled or the scheduler has been shut down.
    pub fn schedule<F, Fut>(&self, stream: StreamId, on_expiry: F) -> Option<RestartHandle>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.enabled {
            return None;
        }

        let token = {
            let root = self.root();
            if root.is_cancelled() {
                return None;
            }
            root.child_token()
        };
        let cancelled = token.clone();
        let delay = self.delay;

        tracing::debug!(
            stream = %stream,
            delay_ms = delay.as_millis() as u64,
            "Restart scheduled"
        );

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    tracing::debug!(stream = %stream, "Restart cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    on_expiry().await;
                }
            }
        });

        Some(RestartHandle { token, task })
    }

    /// Cancel every pending restart and refuse new ones
    pub fn cancel_all(&self) {
        self.root().cancel();
    }

    /// Accept new restarts again after [`RestartScheduler::cancel_all`]
    ///
    /// Restarts cancelled before the reset stay cancelled.
    pub fn reset(&self) {
        let mut root = self.root();
        if root.is_cancelled() {
            *root = CancellationToken::new();
        }
    }
}
