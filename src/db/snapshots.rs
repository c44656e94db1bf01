//! Snapshot persistence keyed by content id.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, SnapshotRow, SnapshotUpsert};

impl Database {
    /// Insert or update a snapshot
    ///
    /// One statement, so concurrent writers for the same id converge on a single
    /// row (last writer wins). An update refreshes the payload, key and flags but
    /// keeps `created_at`, and only replaces stored comments when new ones are
    /// supplied.
    pub async fn upsert_snapshot(&self, snapshot: &SnapshotUpsert<'_>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO content_snapshots (
                content_id, raw_data, snapshot_key, comments_data,
                has_media, has_video, has_quoted, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_id) DO UPDATE SET
                raw_data = excluded.raw_data,
                snapshot_key = excluded.snapshot_key,
                comments_data = COALESCE(excluded.comments_data, content_snapshots.comments_data),
                has_media = excluded.has_media,
                has_video = excluded.has_video,
                has_quoted = excluded.has_quoted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(snapshot.content_id)
        .bind(snapshot.raw_data)
        .bind(snapshot.snapshot_key)
        .bind(snapshot.comments_data)
        .bind(snapshot.flags.has_media as i32)
        .bind(snapshot.flags.has_video as i32)
        .bind(snapshot.flags.has_quoted as i32)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert snapshot: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get a snapshot by content id
    pub async fn get_snapshot(&self, content_id: &str) -> Result<Option<SnapshotRow>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT
                content_id, raw_data, snapshot_key, comments_data,
                has_media, has_video, has_quoted, created_at, updated_at
            FROM content_snapshots
            WHERE content_id = ?
            "#,
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get snapshot: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Stored snapshot key, if the post has been cached
    pub async fn get_snapshot_key(&self, content_id: &str) -> Result<Option<String>> {
        let key: Option<Option<String>> = sqlx::query_scalar(
            "SELECT snapshot_key FROM content_snapshots WHERE content_id = ?",
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get snapshot key: {}",
                e
            )))
        })?;

        Ok(key.flatten())
    }

    /// Count snapshot rows for a content id (0 or 1)
    pub async fn count_snapshots(&self, content_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM content_snapshots WHERE content_id = ?")
                .bind(content_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count snapshots: {}",
                        e
                    )))
                })?;

        Ok(count)
    }
}
