//! Download job persistence: insert, atomic claim, terminal transitions.

use crate::error::{DatabaseError, JobError};
use crate::types::{JobId, JobStatus};
use crate::{Error, Result};

use super::{Database, JobRow, NewJob};

/// Columns readable by API clients; only claims add `cookies`
const JOB_COLUMNS: &str = r#"
    id, owner, source_url, status, task_type, storage_key, error_message,
    metadata, size, worker_id, created_at, claimed_at, completed_at
"#;

impl Database {
    /// Insert a new pending job
    pub async fn insert_job(&self, job: &NewJob) -> Result<JobId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO download_jobs (owner, source_url, status, task_type, cookies, created_at)
            VALUES (?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(&job.owner)
        .bind(&job.source_url)
        .bind(job.task_type.as_str())
        .bind(job.cookies.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert job: {}",
                e
            )))
        })?;

        Ok(JobId(result.last_insert_rowid()))
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: JobId) -> Result<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM download_jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get job: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List an owner's jobs, newest first
    pub async fn list_jobs_for_owner(&self, owner: &str, limit: u32) -> Result<Vec<JobRow>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM download_jobs WHERE owner = ? ORDER BY created_at DESC, id DESC LIMIT ?",
            JOB_COLUMNS
        ))
        .bind(owner)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list jobs: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Atomically move up to `limit` of the oldest pending jobs to processing
    ///
    /// The selection and the status flip are a single statement, so two
    /// concurrent claimers can never receive the same job. The returned rows are
    /// ordered oldest first and are the only reads that carry `cookies`.
    pub async fn claim_jobs(&self, worker_id: &str, limit: u32) -> Result<Vec<JobRow>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let now = chrono::Utc::now().timestamp();

        let mut rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE download_jobs
            SET status = 'processing', worker_id = ?, claimed_at = ?
            WHERE id IN (
                SELECT id FROM download_jobs
                WHERE status = 'pending'
                ORDER BY created_at ASC, id ASC
                LIMIT ?
            )
            AND status = 'pending'
            RETURNING {}, cookies
            "#,
            JOB_COLUMNS
        ))
        .bind(worker_id)
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to claim jobs: {}",
                e
            )))
        })?;

        // RETURNING order is unspecified
        rows.sort_by_key(|row| (row.created_at, row.id));

        Ok(rows)
    }

    /// Move a processing job to completed
    pub async fn complete_job(
        &self,
        id: JobId,
        storage_key: &str,
        metadata: Option<&str>,
        size: Option<i64>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE download_jobs
            SET status = 'completed', storage_key = ?, metadata = ?, size = ?,
                error_message = NULL, cookies = NULL, completed_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(storage_key)
        .bind(metadata)
        .bind(size)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to complete job: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Completed).await);
        }

        Ok(())
    }

    /// Move a processing job to `failed` or `invalid`
    pub async fn fail_job(&self, id: JobId, status: JobStatus, error_message: &str) -> Result<()> {
        if !matches!(status, JobStatus::Failed | JobStatus::Invalid) {
            return Err(Error::Job(JobError::InvalidTransition {
                id: id.0,
                from: JobStatus::Processing.to_string(),
                to: status.to_string(),
            }));
        }

        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE download_jobs
            SET status = ?, error_message = ?, cookies = NULL, completed_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to fail job: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(id, status).await);
        }

        Ok(())
    }

    /// Count jobs per status string
    pub async fn count_jobs_by_status(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM download_jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count jobs: {}",
                        e
                    )))
                })?;

        Ok(rows)
    }

    /// Explain why a conditional transition touched no rows
    async fn transition_error(&self, id: JobId, to: JobStatus) -> Error {
        match self.get_job(id).await {
            Ok(Some(row)) => Error::Job(JobError::InvalidTransition {
                id: id.0,
                from: row.status,
                to: to.to_string(),
            }),
            Ok(None) => Error::Job(JobError::NotFound { id: id.0 }),
            Err(e) => e,
        }
    }
}
