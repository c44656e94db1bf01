//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`archive`] - Archival trigger and snapshot lookup
//! - [`downloads`] - User-facing download queue
//! - [`worker`] - Worker-facing job protocol (service key required)
//! - [`media`] - Range-aware cached media
//! - [`system`] - Health and OpenAPI

use crate::post::Comment;
use crate::types::{DownloadJob, TaskType};
use serde::{Deserialize, Serialize};

mod archive;
mod downloads;
mod media;
mod system;
mod worker;

// Re-export all handlers so `routes::function_name` works
pub use archive::*;
pub use downloads::*;
pub use media::*;
pub use system::*;
pub use worker::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /archive/:content_id (the body itself is optional)
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TriggerArchiveRequest {
    /// Re-run even if a snapshot exists (default: false)
    #[serde(default)]
    pub force: bool,
    /// Comments to embed in the snapshot
    #[serde(default)]
    pub comments: Option<Vec<Comment>>,
}

/// Response for POST /archive/:content_id
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TriggerArchiveResponse {
    /// Post identifier
    pub content_id: String,
    /// What happened to the trigger
    pub status: crate::archive::TriggerStatus,
}

/// Request body for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct EnqueueDownloadRequest {
    /// Requesting user
    pub owner: String,
    /// Absolute http(s) URL to download
    pub source_url: String,
    /// Kind of download (default: video)
    #[serde(default)]
    pub task_type: TaskType,
    /// Session cookies for sources that need a login, as a `Cookie` header
    /// value (`auth_token=..; ct0=..`). Only the claiming worker sees them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
}

/// Query parameters for GET /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ListDownloadsQuery {
    /// Owner whose jobs to list
    pub owner: String,
    /// Maximum number of jobs to return (default: 50)
    pub limit: Option<u32>,
}

/// Request body for POST /internal/jobs/claim
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ClaimJobsRequest {
    /// Claiming worker
    pub worker_id: String,
    /// Maximum number of jobs wanted
    pub limit: u32,
}

/// Response for POST /internal/jobs/claim
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ClaimJobsResponse {
    /// Claimed jobs, oldest first; now `processing`
    pub jobs: Vec<DownloadJob>,
}

/// Request body for POST /internal/jobs/:id/complete
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CompleteJobRequest {
    /// Object key of the stored download
    pub storage_key: String,
    /// Free-form download metadata (title, duration, ...)
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    /// Stored size in bytes
    #[serde(default)]
    pub size: Option<i64>,
}

/// Request body for POST /internal/jobs/:id/fail
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FailJobRequest {
    /// What went wrong (truncated to 500 characters)
    pub error_message: String,
    /// Mark the job `invalid` instead of `failed` (permanent source error)
    #[serde(default)]
    pub invalid: bool,
}
