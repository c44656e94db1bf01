//! Out-of-process video worker
//!
//! A [`Worker`] polls the archive API for pending download jobs, downloads
//! each source with a [`VideoFetcher`] (yt-dlp in production), stores the
//! file at `videos/{content_id}/{filename}` and reports the job completed.
//! Sources that can never be downloaded are reported `invalid`; any other
//! failure is reported `failed`. Jobs are never retried.
//!
//! A job's cookies, when present, are written as a Netscape cookie jar next
//! to the download directory for the duration of the fetch and removed
//! right after it.
//!
//! - [`client`] - HTTP client for the `/internal/jobs` protocol
//! - [`ytdlp`] - yt-dlp based fetcher

mod client;
mod ytdlp;

pub use client::WorkerClient;
pub use ytdlp::{
    COOKIE_DOMAINS, COOKIES_FILE_NAME, FORMAT_SELECTOR, FetchedVideo, PERMANENT_MARKERS,
    VideoFetcher, YtDlpFetcher, classify_failure, netscape_cookies, parse_output,
    write_cookies_file, ytdlp_args,
};

use crate::config::WorkerConfig;
use crate::queue::truncate_error;
use crate::storage::{ObjectStore, PutOptions, content_type_for_key};
use crate::types::DownloadJob;
use crate::{Error, Result};
use bytes::Bytes;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// How a single job ended from the worker's point of view
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// Stored and reported completed
    Completed {
        /// Object key of the stored video
        storage_key: String,
    },
    /// Reported failed
    Failed,
    /// Reported invalid
    Invalid,
}

/// Polling video worker
pub struct Worker {
    client: WorkerClient,
    fetcher: Arc<dyn VideoFetcher>,
    store: Arc<dyn ObjectStore>,
    config: WorkerConfig,
}

impl Worker {
    /// Create a worker
    ///
    /// `store` must point at the same object storage the archive API serves
    /// media from.
    pub fn new(
        config: WorkerConfig,
        fetcher: Arc<dyn VideoFetcher>,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        if config.worker_id.trim().is_empty() {
            return Err(Error::Config {
                message: "worker_id must not be empty".to_string(),
                key: Some("worker.worker_id".to_string()),
            });
        }
        if config.batch_size == 0 {
            return Err(Error::Config {
                message: "batch_size must be at least 1".to_string(),
                key: Some("worker.batch_size".to_string()),
            });
        }

        Ok(Self {
            client: WorkerClient::new(&config)?,
            fetcher,
            store,
            config,
        })
    }

    /// Poll until `cancel` fires
    ///
    /// Cancellation is only observed between polls; a job that has been
    /// claimed is always driven to a terminal state first.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            worker_id = %self.config.worker_id,
            api = %self.config.api_base_url,
            fetcher = self.fetcher.name(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Worker started"
        );

        while !cancel.is_cancelled() {
            let processed = match self.run_once().await {
                Ok(processed) => processed,
                Err(e) => {
                    tracing::error!(error = %e, "Worker poll failed");
                    0
                }
            };

            if processed == 0 {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        tracing::info!(worker_id = %self.config.worker_id, "Worker stopped");
        Ok(())
    }

    /// Claim one batch and process it; returns how many jobs were handled
    pub async fn run_once(&self) -> Result<usize> {
        let jobs = self
            .client
            .claim(&self.config.worker_id, self.config.batch_size)
            .await?;

        if jobs.is_empty() {
            tracing::debug!("No pending jobs");
            return Ok(0);
        }

        for job in &jobs {
            if let Err(e) = self.process_job(job).await {
                // Reporting itself failed; the job stays processing
                tracing::error!(job_id = job.id.0, error = %e, "Failed to report job outcome");
            }
        }
        Ok(jobs.len())
    }

    /// Download, store and report one claimed job
    pub async fn process_job(&self, job: &DownloadJob) -> Result<JobOutcome> {
        tracing::info!(job_id = job.id.0, source_url = %job.source_url, "Processing job");

        match self.download_and_store(job).await {
            Ok((storage_key, metadata, size)) => {
                self.client
                    .complete(job.id, &storage_key, Some(metadata), Some(size))
                    .await?;
                tracing::info!(
                    job_id = job.id.0,
                    storage_key = %storage_key,
                    size,
                    "Job completed"
                );
                Ok(JobOutcome::Completed { storage_key })
            }
            Err(e @ Error::PermanentSource { .. }) => {
                let message = truncate_error(&e.to_string());
                tracing::warn!(
                    job_id = job.id.0,
                    error = %message,
                    "Source permanently unavailable"
                );
                self.client.fail(job.id, &message, true).await?;
                Ok(JobOutcome::Invalid)
            }
            Err(e) => {
                let message = truncate_error(&e.to_string());
                tracing::error!(job_id = job.id.0, error = %message, "Job failed");
                self.client.fail(job.id, &message, false).await?;
                Ok(JobOutcome::Failed)
            }
        }
    }

    async fn download_and_store(
        &self,
        job: &DownloadJob,
    ) -> Result<(String, serde_json::Value, i64)> {
        let scratch = tempfile::TempDir::new()?;
        let output_dir = scratch.path().join("download");
        tokio::fs::create_dir(&output_dir).await?;

        let cookies_file = match job.cookies.as_deref() {
            Some(cookies) => Some(write_cookies_file(scratch.path(), cookies).await?),
            None => None,
        };
        let fetched = self
            .fetcher
            .fetch(&job.source_url, cookies_file.as_deref(), &output_dir)
            .await;
        if let Some(path) = &cookies_file
            && let Err(e) = tokio::fs::remove_file(path).await
        {
            tracing::warn!(job_id = job.id.0, error = %e, "Failed to remove cookie jar");
        }
        let video = fetched?;

        let storage_key = video_key(&content_id_for(&job.source_url, job.id.0), &video.path)?;
        let body = Bytes::from(tokio::fs::read(&video.path).await?);
        let size = body.len() as i64;

        let content_type =
            content_type_for_key(&storage_key).unwrap_or_else(|| "video/mp4".to_string());
        self.store
            .put(&storage_key, body, PutOptions::immutable(content_type))
            .await?;

        let metadata = serde_json::json!({
            "title": video.title,
            "duration": video.duration,
            "source_url": job.source_url,
        });

        Ok((storage_key, metadata, size))
    }
}

/// Post id from a `/status/{digits}` URL, or `job-{id}` when there is none
pub fn content_id_for(source_url: &str, job_id: i64) -> String {
    static STATUS_ID: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = STATUS_ID.get_or_init(|| Regex::new(r"/status/(\d+)").ok());

    pattern
        .as_ref()
        .and_then(|re| re.captures(source_url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| format!("job-{}", job_id))
}

fn video_key(content_id: &str, path: &Path) -> Result<String> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            Error::ExternalTool(format!("downloaded file has no usable name: {}", path.display()))
        })?;
    Ok(format!("videos/{}/{}", content_id, filename))
}
