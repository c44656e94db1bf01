//! HTTP client for the worker-facing job protocol

use crate::api::auth::SERVICE_KEY_HEADER;
use crate::api::routes::{ClaimJobsRequest, ClaimJobsResponse, CompleteJobRequest, FailJobRequest};
use crate::config::{RetryConfig, WorkerConfig};
use crate::error::{ApiError, JobError};
use crate::retry::{IsRetryable, with_retry};
use crate::types::{DownloadJob, JobId};
use crate::{Error, Result};
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Talks to `/internal/jobs/*` with the shared service key
///
/// `complete` and `fail` are retried with backoff per [`RetryConfig`] on
/// connect failures, timeouts, 429 and 5xx answers. `claim` is only retried
/// when the connection could not be made: once the server may have seen the
/// request, repeating it would claim a second batch and strand the first.
#[derive(Clone, Debug)]
pub struct WorkerClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    retry: RetryConfig,
}

impl WorkerClient {
    /// Create a client from worker configuration
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Claim up to `limit` pending jobs
    pub async fn claim(&self, worker_id: &str, limit: u32) -> Result<Vec<DownloadJob>> {
        let body = ClaimJobsRequest {
            worker_id: worker_id.to_string(),
            limit,
        };
        let body = &body;
        let response: ClaimJobsResponse = with_retry(&self.retry, || async move {
            self.send("/internal/jobs/claim", None, body)
                .await
                .map_err(Unsent)
        })
        .await
        .map_err(|Unsent(e)| e)?;
        Ok(response.jobs)
    }

    /// Report a job as completed
    pub async fn complete(
        &self,
        id: JobId,
        storage_key: &str,
        metadata: Option<serde_json::Value>,
        size: Option<i64>,
    ) -> Result<DownloadJob> {
        let body = CompleteJobRequest {
            storage_key: storage_key.to_string(),
            metadata,
            size,
        };
        self.post(&format!("/internal/jobs/{}/complete", id), Some(id), &body)
            .await
    }

    /// Report a job as failed, or as invalid when the source is permanently unusable
    pub async fn fail(&self, id: JobId, error_message: &str, invalid: bool) -> Result<DownloadJob> {
        let body = FailJobRequest {
            error_message: error_message.to_string(),
            invalid,
        };
        self.post(&format!("/internal/jobs/{}/fail", id), Some(id), &body)
            .await
    }

    async fn post<B, T>(&self, path: &str, job: Option<JobId>, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        with_retry(&self.retry, || self.send(path, job, body)).await
    }

    /// One request, no retries
    async fn send<B, T>(&self, path: &str, job: Option<JobId>, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .header(SERVICE_KEY_HEADER, &self.service_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let api_error = response.json::<ApiError>().await.ok();
        Err(error_for_status(&url, status, job, api_error))
    }
}

/// Failure of a call that must not be repeated once it reached the server
#[derive(Debug)]
struct Unsent(Error);

impl IsRetryable for Unsent {
    fn is_retryable(&self) -> bool {
        matches!(&self.0, Error::Network(e) if e.is_connect())
    }
}

impl std::fmt::Display for Unsent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Map a non-success answer from the API to a domain error
fn error_for_status(
    url: &str,
    status: StatusCode,
    job: Option<JobId>,
    api_error: Option<ApiError>,
) -> Error {
    let message = api_error
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| status.to_string());

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Error::TransientFetch {
            target: url.to_string(),
            reason: message,
        };
    }

    let detail = |field: &str| {
        api_error
            .as_ref()
            .and_then(|e| e.error.details.as_ref())
            .and_then(|d| d[field].as_str())
            .unwrap_or("unknown")
            .to_string()
    };

    match (status, job) {
        (StatusCode::UNAUTHORIZED, _) => Error::Config {
            message: format!("service key rejected by {}: {}", url, message),
            key: Some("worker.service_key".to_string()),
        },
        (StatusCode::NOT_FOUND, Some(id)) => Error::Job(JobError::NotFound { id: id.get() }),
        (StatusCode::CONFLICT, Some(id)) => Error::Job(JobError::InvalidTransition {
            id: id.get(),
            from: detail("current_status"),
            to: detail("requested_status"),
        }),
        _ => Error::Other(format!("{} answered {}: {}", url, status, message)),
    }
}
