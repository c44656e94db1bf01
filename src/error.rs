//! Error types for tidyfeed-archive
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (storage, job state machine, database)
//! - The transient/permanent split used by the archival pipeline and workers
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for tidyfeed-archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tidyfeed-archive
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "archive.media_concurrency")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Origin or provider unreachable, rate-limited, or returned a server error
    #[error("transient fetch error for {target}: {reason}")]
    TransientFetch {
        /// The post id or URL that was being fetched
        target: String,
        /// What went wrong
        reason: String,
    },

    /// Source content is gone or private; retrying will not help
    #[error("source unavailable for {target}: {reason}")]
    PermanentSource {
        /// The post id or URL that was being fetched
        target: String,
        /// What went wrong
        reason: String,
    },

    /// Object storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Download job state machine error
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Provider payload failed validation at the ingestion boundary
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Structurally invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// External tool execution failed (yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Stored value could not be decoded
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing an object failed
    #[error("failed to write {key}: {reason}")]
    WriteFailed {
        /// Object key
        key: String,
        /// The reason the write failed
        reason: String,
    },

    /// Reading an object failed
    #[error("failed to read {key}: {reason}")]
    ReadFailed {
        /// Object key
        key: String,
        /// The reason the read failed
        reason: String,
    },

    /// Object does not exist
    #[error("object {key} not found")]
    NotFound {
        /// Object key
        key: String,
    },

    /// Key is empty, absolute, or escapes the store root
    #[error("invalid object key {key:?}")]
    InvalidKey {
        /// Offending key
        key: String,
    },

    /// Requested range starts past the end of the object as opened
    #[error("range starting at {start} is outside {key} ({size} bytes)")]
    RangeNotSatisfiable {
        /// Object key
        key: String,
        /// First requested byte
        start: u64,
        /// Object size when it was opened
        size: u64,
    },
}

/// Download job state machine errors
#[derive(Debug, Error)]
pub enum JobError {
    /// Job does not exist
    #[error("job {id} not found")]
    NotFound {
        /// The job ID that was not found
        id: i64,
    },

    /// Requested transition is not allowed from the job's current status
    #[error("cannot move job {id} from {from} to {to}")]
    InvalidTransition {
        /// The job ID
        id: i64,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job 123 not found",
///     "details": {
///       "job_id": 123
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_url")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,
            Error::Storage(StorageError::InvalidKey { .. }) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Job(JobError::NotFound { .. }) => 404,
            Error::Storage(StorageError::NotFound { .. }) => 404,

            // 416 Range Not Satisfiable - object shrank between head and read
            Error::Storage(StorageError::RangeNotSatisfiable { .. }) => 416,

            // 409 Conflict - job is not in a state that allows the transition
            Error::Job(JobError::InvalidTransition { .. }) => 409,

            // 422 Unprocessable Entity - Semantic errors
            Error::InvalidPayload(_) => 422,
            Error::PermanentSource { .. } => 422,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Storage(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::TransientFetch { .. } => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::TransientFetch { .. } => "transient_fetch_error",
            Error::PermanentSource { .. } => "source_unavailable",
            Error::Storage(e) => match e {
                StorageError::WriteFailed { .. } => "storage_write_failed",
                StorageError::ReadFailed { .. } => "storage_read_failed",
                StorageError::NotFound { .. } => "object_not_found",
                StorageError::InvalidKey { .. } => "invalid_key",
                StorageError::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            },
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::InvalidTransition { .. } => "invalid_transition",
            },
            Error::InvalidPayload(_) => "invalid_payload",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::ExternalTool(_) => "external_tool_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::InvalidTransition { id, from, to }) => Some(serde_json::json!({
                "job_id": id,
                "current_status": from,
                "requested_status": to,
            })),
            Error::Storage(StorageError::NotFound { key })
            | Error::Storage(StorageError::InvalidKey { key }) => Some(serde_json::json!({
                "key": key,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
