//! Service facade wiring the archival pipeline and the download queue.
//!
//! [`ArchiveService`] owns every long-lived collaborator: the database pool,
//! the object store, the background task supervisor, the snapshot
//! orchestrator and the download queue. The REST API and the demo programs
//! only ever talk to this type.
//!
//! - [`lifecycle`] - API server spawning and graceful shutdown

mod lifecycle;

use crate::archive::SnapshotOrchestrator;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::media_cache::MediaCacheService;
use crate::provider::{ContentProvider, HttpContentProvider};
use crate::queue::DownloadQueue;
use crate::storage::{ObjectStore, build_object_store};
use crate::tasks::TaskSupervisor;
use std::sync::Arc;

/// Archival and download-queue service
#[derive(Clone)]
pub struct ArchiveService {
    config: Arc<Config>,
    db: Arc<Database>,
    store: Arc<dyn ObjectStore>,
    supervisor: Arc<TaskSupervisor>,
    orchestrator: SnapshotOrchestrator,
    queue: DownloadQueue,
}

impl ArchiveService {
    /// Create a service from configuration
    ///
    /// Validates the configuration, opens (and migrates) the database, builds
    /// the configured object store and the HTTP content provider.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyfeed_archive::{ArchiveService, Config};
    ///
    /// # async fn example() -> tidyfeed_archive::Result<()> {
    /// let service = ArchiveService::new(Config::default()).await?;
    /// let stats = service.queue().stats().await?;
    /// println!("{} jobs pending", stats.pending);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;
        let store = build_object_store(&config.storage);
        let provider: Arc<dyn ContentProvider> =
            Arc::new(HttpContentProvider::new(&config.provider)?);

        tracing::info!(
            database = %config.persistence.database_path.display(),
            storage = ?config.storage.backend,
            provider = %config.provider.base_url,
            "Archive service initialized"
        );

        Self::with_components(config, Arc::new(db), store, provider)
    }

    /// Create a service around already-built collaborators
    ///
    /// Used by tests to plug in an in-memory store or a mock provider.
    pub fn with_components(
        config: Config,
        db: Arc<Database>,
        store: Arc<dyn ObjectStore>,
        provider: Arc<dyn ContentProvider>,
    ) -> Result<Self> {
        let supervisor = Arc::new(TaskSupervisor::new());
        let media = MediaCacheService::new(store.clone(), config.storage.clone(), &config.archive)?;

        let orchestrator = SnapshotOrchestrator::new(
            db.clone(),
            provider,
            media,
            store.clone(),
            config.archive.clone(),
            supervisor.clone(),
        );
        let queue = DownloadQueue::new(db.clone(), config.queue.clone());

        Ok(Self {
            config: Arc::new(config),
            db,
            store,
            supervisor,
            orchestrator,
            queue,
        })
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Database handle
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Object store holding snapshots and media
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Background task supervisor
    pub fn supervisor(&self) -> &Arc<TaskSupervisor> {
        &self.supervisor
    }

    /// Snapshot pipeline
    pub fn orchestrator(&self) -> &SnapshotOrchestrator {
        &self.orchestrator
    }

    /// Download job queue
    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }
}
