//! Fire-and-forget background work
//!
//! Archival runs are detached from the request that triggered them.
//! [`TaskSupervisor::submit`] returns immediately; the supervisor logs how each
//! task ended, panics included, and lets shutdown wait for whatever is still
//! running. Nothing is ever aborted.

use crate::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::task::TaskTracker;

/// Tracks detached background tasks
#[derive(Debug, Default)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
    closed: AtomicBool,
}

impl TaskSupervisor {
    /// Create a supervisor accepting submissions
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` in the background under `name`
    ///
    /// Errors and panics are logged, never propagated. Fails with
    /// [`Error::ShuttingDown`] once [`TaskSupervisor::shutdown`] has started.
    pub fn submit<F>(&self, name: impl Into<String>, work: F) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        // Shutdown cannot finish waiting while this token is alive
        let _token = self.tracker.token();
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let name = name.into();
        // The inner spawn isolates panics so the outer task can report them
        let inner = tokio::spawn(work);

        self.tracker.spawn(async move {
            match inner.await {
                Ok(Ok(())) => {
                    tracing::debug!(task = %name, "Background task finished");
                }
                Ok(Err(e)) => {
                    tracing::warn!(task = %name, error = %e, "Background task failed");
                }
                Err(e) if e.is_panic() => {
                    tracing::error!(task = %name, "Background task panicked");
                }
                Err(e) => {
                    tracing::warn!(task = %name, error = %e, "Background task did not complete");
                }
            }
        });

        Ok(())
    }

    /// Number of tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Whether new submissions are still accepted
    pub fn is_accepting(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Wait until no task is running, without closing the supervisor
    pub async fn wait_idle(&self) {
        while !self.tracker.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop accepting work and wait for running tasks, up to `timeout`
    ///
    /// Returns `true` if every task finished in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.closed.store(true, Ordering::SeqCst);
        self.tracker.close();

        let remaining = self.tracker.len();
        if remaining > 0 {
            tracing::info!(remaining, "Waiting for background tasks to finish");
        }

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.tracker.len(),
                    "Timeout waiting for background tasks, proceeding with shutdown"
                );
                false
            }
        }
    }
}
