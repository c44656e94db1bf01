//! Download job queue
//!
//! Jobs move `pending → processing → {completed | failed | invalid}` and never
//! go back. The API process only enqueues and reads; workers claim jobs and
//! drive them to a terminal state. Claiming is a single database statement, so
//! concurrent workers never receive the same job.

use crate::config::QueueConfig;
use crate::db::{Database, NewJob};
use crate::types::{DownloadJob, JobId, JobStatus, QueueStats, TaskType};
use crate::{Error, Result};
use std::sync::Arc;

/// Longest error message stored on a job
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Longest cookie string accepted with a job
pub const MAX_COOKIES_LEN: usize = 8 * 1024;

/// Default page size for [`DownloadQueue::list_for_owner`]
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Job state machine shared between the API and workers
#[derive(Clone)]
pub struct DownloadQueue {
    db: Arc<Database>,
    config: QueueConfig,
}

impl DownloadQueue {
    /// Create a queue over `db`
    pub fn new(db: Arc<Database>, config: QueueConfig) -> Self {
        Self { db, config }
    }

    /// Add a pending job
    ///
    /// The URL must be an absolute http(s) URL with a host; anything else is
    /// rejected before touching the database. `cookies` (a `Cookie` header
    /// value such as `auth_token=..; ct0=..`) is handed to the claiming worker
    /// and wiped once the job finishes.
    pub async fn enqueue(
        &self,
        owner: &str,
        source_url: &str,
        task_type: TaskType,
        cookies: Option<&str>,
    ) -> Result<DownloadJob> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(Error::InvalidPayload("owner must not be empty".to_string()));
        }
        let source_url = validate_source_url(source_url)?;
        let cookies = cookies.map(str::trim).filter(|c| !c.is_empty());
        if cookies.is_some_and(|c| c.len() > MAX_COOKIES_LEN) {
            return Err(Error::InvalidPayload(format!(
                "cookies must be at most {} bytes",
                MAX_COOKIES_LEN
            )));
        }

        let id = self
            .db
            .insert_job(&NewJob {
                owner: owner.to_string(),
                source_url,
                task_type,
                cookies: cookies.map(str::to_string),
            })
            .await?;

        tracing::info!(
            job_id = id.0,
            owner,
            task_type = task_type.as_str(),
            with_cookies = cookies.is_some(),
            "Download job enqueued"
        );

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {} vanished after insert", id)))
    }

    /// Atomically claim up to `limit` of the oldest pending jobs for `worker_id`
    ///
    /// `limit` is clamped to the configured maximum batch; zero claims nothing.
    pub async fn claim(&self, worker_id: &str, limit: u32) -> Result<Vec<DownloadJob>> {
        let worker_id = worker_id.trim();
        if worker_id.is_empty() {
            return Err(Error::InvalidPayload("worker_id must not be empty".to_string()));
        }

        let limit = limit.min(self.config.max_claim_batch);
        let rows = self.db.claim_jobs(worker_id, limit).await?;
        if !rows.is_empty() {
            tracing::info!(worker_id, claimed = rows.len(), "Jobs claimed");
        }

        rows.into_iter().map(DownloadJob::try_from).collect()
    }

    /// `processing → completed`
    pub async fn complete(
        &self,
        id: JobId,
        storage_key: &str,
        metadata: Option<&serde_json::Value>,
        size: Option<i64>,
    ) -> Result<()> {
        if storage_key.trim().is_empty() {
            return Err(Error::InvalidPayload("storage_key must not be empty".to_string()));
        }
        let metadata = metadata.map(serde_json::to_string).transpose()?;

        self.db
            .complete_job(id, storage_key, metadata.as_deref(), size)
            .await?;
        tracing::info!(job_id = id.0, storage_key, "Job completed");
        Ok(())
    }

    /// `processing → failed`; never retried automatically
    pub async fn fail(&self, id: JobId, error_message: &str) -> Result<()> {
        self.finish_with_error(id, JobStatus::Failed, error_message).await
    }

    /// `processing → invalid` for sources that can never be downloaded
    pub async fn mark_invalid(&self, id: JobId, error_message: &str) -> Result<()> {
        self.finish_with_error(id, JobStatus::Invalid, error_message).await
    }

    async fn finish_with_error(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: &str,
    ) -> Result<()> {
        let message = truncate_error(error_message);
        self.db.fail_job(id, status, &message).await?;
        tracing::warn!(
            job_id = id.0,
            status = status.as_str(),
            error = %message,
            "Job finished with error"
        );
        Ok(())
    }

    /// One job by ID
    pub async fn get(&self, id: JobId) -> Result<Option<DownloadJob>> {
        self.db.get_job(id).await?.map(DownloadJob::try_from).transpose()
    }

    /// An owner's jobs, newest first
    pub async fn list_for_owner(
        &self,
        owner: &str,
        limit: Option<u32>,
    ) -> Result<Vec<DownloadJob>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500);
        self.db
            .list_jobs_for_owner(owner, limit)
            .await?
            .into_iter()
            .map(DownloadJob::try_from)
            .collect()
    }

    /// Job counts per status
    pub async fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats::default();
        for (status, count) in self.db.count_jobs_by_status().await? {
            let count = count.max(0) as u64;
            match JobStatus::parse(&status) {
                Some(JobStatus::Pending) => stats.pending = count,
                Some(JobStatus::Processing) => stats.processing = count,
                Some(JobStatus::Completed) => stats.completed = count,
                Some(JobStatus::Failed) => stats.failed = count,
                Some(JobStatus::Invalid) => stats.invalid = count,
                None => tracing::warn!(status = %status, "Ignoring unknown job status in stats"),
            }
        }
        Ok(stats)
    }
}

/// Check that a source URL is absolute http(s) with a host
pub fn validate_source_url(source_url: &str) -> Result<String> {
    let trimmed = source_url.trim();
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::InvalidUrl(format!("{:?}: {}", trimmed, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!(
            "{:?}: scheme must be http or https",
            trimmed
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(format!("{:?}: missing host", trimmed)));
    }

    Ok(trimmed.to_string())
}

/// Cut an error message to [`MAX_ERROR_MESSAGE_CHARS`] characters
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}
