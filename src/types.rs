//! Core types for tidyfeed-archive

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a download job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Download job status
///
/// `Pending` is the only initial state. `Completed`, `Failed` and `Invalid` are
/// terminal; nothing ever leaves them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for a worker
    Pending,
    /// Claimed by a worker
    Processing,
    /// Downloaded and stored
    Completed,
    /// Download failed
    Failed,
    /// Source is permanently unusable (deleted, private, unsupported)
    Invalid,
}

impl JobStatus {
    /// Every status, in lifecycle order
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Invalid,
    ];

    /// Database/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Invalid => "invalid",
        }
    }

    /// Parse the database representation
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Whether the job has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Invalid
        )
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Invalid)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of download a job asks for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Best available video+audio
    #[default]
    Video,
    /// Still image
    Image,
}

impl TaskType {
    /// Database/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Video => "video",
            TaskType::Image => "image",
        }
    }

    /// Parse the database representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(TaskType::Video),
            "image" => Some(TaskType::Image),
            _ => None,
        }
    }
}

/// A download job as exposed to API clients and workers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DownloadJob {
    /// Job ID
    pub id: JobId,
    /// Account that requested the download
    pub owner: String,
    /// Post URL to download from
    pub source_url: String,
    /// Current status
    pub status: JobStatus,
    /// Kind of download
    pub task_type: TaskType,
    /// Object key of the stored result (completed jobs only)
    pub storage_key: Option<String>,
    /// Failure reason (failed/invalid jobs only)
    pub error_message: Option<String>,
    /// Worker-supplied metadata (title, duration, ...)
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    /// Stored size in bytes
    pub size: Option<i64>,
    /// Worker currently or last holding the job
    pub worker_id: Option<String>,
    /// When the job was enqueued
    pub created_at: DateTime<Utc>,
    /// When a worker claimed the job
    pub claimed_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Session cookies for the source, handed to the claiming worker only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
}

/// Job counts per status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QueueStats {
    /// Waiting for a worker
    pub pending: u64,
    /// Claimed by a worker
    pub processing: u64,
    /// Finished successfully
    pub completed: u64,
    /// Finished with an error
    pub failed: u64,
    /// Rejected as permanently unusable
    pub invalid: u64,
}

/// Content flags stored alongside a snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SnapshotFlags {
    /// Post or quoted post carries media
    pub has_media: bool,
    /// At least one media item is a video or animated gif
    pub has_video: bool,
    /// Post quotes another post
    pub has_quoted: bool,
}

/// A cached post snapshot as exposed to API clients
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ContentSnapshot {
    /// Post identifier (dedup key)
    pub content_id: String,
    /// URL-rewritten post payload
    #[schema(value_type = Object)]
    pub raw_data: serde_json::Value,
    /// Object key of the rendered HTML
    pub snapshot_key: Option<String>,
    /// Stored comments
    #[schema(value_type = Option<Object>)]
    pub comments_data: Option<serde_json::Value>,
    /// Content flags
    #[serde(flatten)]
    pub flags: SnapshotFlags,
    /// First cached
    pub created_at: DateTime<Utc>,
    /// Last re-cached
    pub updated_at: DateTime<Utc>,
}
