//! Database layer for tidyfeed-archive
//!
//! Handles SQLite persistence for post snapshots and download jobs.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`snapshots`] - Snapshot upsert/get keyed by content id
//! - [`jobs`] - Download job insert, atomic claim, terminal transitions

use crate::error::DatabaseError;
use crate::types::{ContentSnapshot, DownloadJob, JobId, JobStatus, SnapshotFlags, TaskType};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod jobs;
mod migrations;
mod snapshots;

/// Snapshot to be written by [`Database::upsert_snapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotUpsert<'a> {
    /// Post identifier (unique key)
    pub content_id: &'a str,
    /// Serialized post payload
    pub raw_data: &'a str,
    /// Object key of the rendered HTML
    pub snapshot_key: &'a str,
    /// Serialized comments; `None` keeps whatever is stored
    pub comments_data: Option<&'a str>,
    /// Content flags
    pub flags: SnapshotFlags,
}

/// Snapshot record from database
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    /// Post identifier (unique key)
    pub content_id: String,
    /// Serialized post payload
    pub raw_data: String,
    /// Object key of the rendered HTML
    pub snapshot_key: Option<String>,
    /// Serialized comments
    pub comments_data: Option<String>,
    /// 1 if the post carries media
    pub has_media: i32,
    /// 1 if any media item is a video
    pub has_video: i32,
    /// 1 if the post quotes another post
    pub has_quoted: i32,
    /// Unix timestamp of the first cache
    pub created_at: i64,
    /// Unix timestamp of the last re-cache
    pub updated_at: i64,
}

impl SnapshotRow {
    /// Stored content flags
    pub fn flags(&self) -> SnapshotFlags {
        SnapshotFlags {
            has_media: self.has_media != 0,
            has_video: self.has_video != 0,
            has_quoted: self.has_quoted != 0,
        }
    }
}

impl TryFrom<SnapshotRow> for ContentSnapshot {
    type Error = Error;

    fn try_from(row: SnapshotRow) -> Result<Self> {
        let flags = row.flags();
        let raw_data = serde_json::from_str(&row.raw_data).map_err(|e| {
            Error::Database(DatabaseError::CorruptRow(format!(
                "raw_data for {}: {}",
                row.content_id, e
            )))
        })?;
        let comments_data = row
            .comments_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| {
                Error::Database(DatabaseError::CorruptRow(format!(
                    "comments_data for {}: {}",
                    row.content_id, e
                )))
            })?;

        Ok(ContentSnapshot {
            content_id: row.content_id,
            raw_data,
            snapshot_key: row.snapshot_key,
            comments_data,
            flags,
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
        })
    }
}

/// New download job to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Account requesting the download
    pub owner: String,
    /// Validated source URL
    pub source_url: String,
    /// Kind of download
    pub task_type: TaskType,
    /// `Cookie`-header style session cookies for the source
    pub cookies: Option<String>,
}

/// Download job record from database
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    /// Unique database ID
    pub id: i64,
    /// Account requesting the download
    pub owner: String,
    /// Source URL
    pub source_url: String,
    /// Status (see [`JobStatus::as_str`])
    pub status: String,
    /// Kind of download (see [`TaskType::as_str`])
    pub task_type: String,
    /// Object key of the result
    pub storage_key: Option<String>,
    /// Failure reason
    pub error_message: Option<String>,
    /// Worker-supplied metadata JSON
    pub metadata: Option<String>,
    /// Stored size in bytes
    pub size: Option<i64>,
    /// Claiming worker
    pub worker_id: Option<String>,
    /// Unix timestamp when enqueued
    pub created_at: i64,
    /// Unix timestamp when claimed
    pub claimed_at: Option<i64>,
    /// Unix timestamp when a terminal state was reached
    pub completed_at: Option<i64>,
    /// Source cookies; only selected when a worker claims the job
    #[sqlx(default)]
    pub cookies: Option<String>,
}

impl JobRow {
    /// Parsed status
    pub fn job_status(&self) -> Result<JobStatus> {
        JobStatus::parse(&self.status).ok_or_else(|| {
            Error::Database(DatabaseError::CorruptRow(format!(
                "job {} has unknown status {:?}",
                self.id, self.status
            )))
        })
    }
}

impl TryFrom<JobRow> for DownloadJob {
    type Error = Error;

    fn try_from(row: JobRow) -> Result<Self> {
        let status = row.job_status()?;
        let task_type = TaskType::parse(&row.task_type).ok_or_else(|| {
            Error::Database(DatabaseError::CorruptRow(format!(
                "job {} has unknown task type {:?}",
                row.id, row.task_type
            )))
        })?;
        // Metadata is opaque worker output; keep it as a string if it is not JSON
        let metadata = row.metadata.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        });

        Ok(DownloadJob {
            id: JobId(row.id),
            owner: row.owner,
            source_url: row.source_url,
            status,
            task_type,
            storage_key: row.storage_key,
            error_message: row.error_message,
            metadata,
            size: row.size,
            worker_id: row.worker_id,
            created_at: timestamp(row.created_at),
            claimed_at: row.claimed_at.map(timestamp),
            completed_at: row.completed_at.map(timestamp),
            cookies: row.cookies,
        })
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

/// Database handle for tidyfeed-archive
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
