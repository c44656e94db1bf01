//! # tidyfeed-archive
//!
//! Archival backend for saved social posts.
//!
//! The crate has three cooperating parts:
//! - **Snapshot pipeline** - fetches a post, re-hosts its media into object
//!   storage and renders a self-contained HTML snapshot
//! - **Download queue** - a small job queue for video downloads, drained by
//!   out-of-process [`worker::Worker`]s through `/internal/jobs`
//! - **Media server** - serves stored objects over HTTP with byte-range support
//!
//! ## Quick Start
//!
//! ```no_run
//! use tidyfeed_archive::{ArchiveService, ArchiveRequest, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ArchiveService::new(Config::default()).await?;
//!
//!     // Fire-and-forget; the run continues in the background
//!     service.orchestrator().trigger(ArchiveRequest::new("1234567890"))?;
//!
//!     service.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Snapshot orchestration
pub mod archive;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Media re-hosting
pub mod media_cache;
/// Post model and URL rewriting
pub mod post;
/// Live content provider client
pub mod provider;
/// Download job queue
pub mod queue;
/// HTTP Range header parsing
pub mod range;
/// Snapshot HTML rendering
pub mod render;
/// Retry logic with exponential backoff
pub mod retry;
/// Service wiring and lifecycle
pub mod service;
/// Object storage backends
pub mod storage;
/// Background task supervision
pub mod tasks;
/// Core types
pub mod types;
/// Out-of-process video worker
pub mod worker;

// Re-export commonly used types
pub use archive::{ArchiveOutcome, ArchiveRequest, SnapshotOrchestrator, TriggerStatus};
pub use config::{ArchiveConfig, Config, StorageBackend, StorageConfig, WorkerConfig};
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, JobError, Result, StorageError, ToHttpStatus,
};
pub use post::{Comment, PostDetail};
pub use provider::{ContentProvider, HttpContentProvider};
pub use queue::DownloadQueue;
pub use service::ArchiveService;
pub use storage::{LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use types::{ContentSnapshot, DownloadJob, JobId, JobStatus, QueueStats, TaskType};
pub use worker::{VideoFetcher, Worker, YtDlpFetcher};

/// Helper function to run the service with graceful signal handling.
///
/// Waits for a termination signal and then calls the service's `shutdown()` method,
/// which lets in-flight archival runs finish before closing the database.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use tidyfeed_archive::{ArchiveService, Config, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = Arc::new(ArchiveService::new(Config::default()).await?);
///     let _api = service.spawn_api_server();
///
///     run_with_shutdown(service).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: std::sync::Arc<ArchiveService>) -> Result<()> {
    wait_for_signal().await;
    service.shutdown().await
}

/// Resolve once SIGTERM or SIGINT (Ctrl+C elsewhere) arrives
pub async fn wait_for_signal() {
    wait_for_platform_signal().await
}

#[cfg(unix)]
async fn wait_for_platform_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for SIGINT only"
            );
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGINT handler, waiting for SIGTERM only"
            );
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_platform_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
