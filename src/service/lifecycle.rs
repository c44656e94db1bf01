//! Startup and shutdown coordination

use super::ArchiveService;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for in-flight archival runs
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl ArchiveService {
    /// Gracefully shut down the service
    ///
    /// Stops accepting archival triggers, waits (up to 30 seconds) for
    /// in-flight runs to finish and closes the database pool. Running
    /// pipelines are waited for, never aborted.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(SHUTDOWN_TIMEOUT).await
    }

    pub(crate) async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        if self.supervisor.shutdown(timeout).await {
            tracing::info!("All archival runs completed");
        } else {
            tracing::warn!("Archival runs still in flight at shutdown; their results may be lost");
        }

        self.db.pool().close().await;
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on `server.api.bind_address` until the process
    /// exits or the returned handle is aborted.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let service = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(service, config).await })
    }
}
