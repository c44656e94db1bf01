//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;
use std::time::Duration;

use super::Database;

/// How long a writer waits on a locked database before giving up.
/// Concurrent claimers queue on this rather than failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        if current_version < 1 {
            Self::apply_migration(&mut conn, 1, MIGRATION_V1).await?;
        }
        if current_version < 2 {
            Self::apply_migration(&mut conn, 2, MIGRATION_V2).await?;
        }
        if current_version < 3 {
            Self::apply_migration(&mut conn, 3, MIGRATION_V3).await?;
        }

        Ok(())
    }

    /// Run one migration's statements inside a transaction and record it
    async fn apply_migration(
        conn: &mut SqliteConnection,
        version: i64,
        steps: &[(&str, &str)],
    ) -> Result<()> {
        tracing::info!(version, "Applying database migration");

        // Wrap migration in a transaction so partial failures don't leave the DB in a broken state
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            for (sql, context) in steps {
                sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
                    Error::Database(DatabaseError::MigrationFailed(format!(
                        "{}: {}",
                        context, e
                    )))
                })?;
            }
            Self::record_migration(&mut *conn, version).await
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v{}: {}",
                            version, e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!(version, "Database migration complete");
        Ok(())
    }

    /// Record a migration version as applied
    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration v{}: {}",
                    version, e
                )))
            })?;

        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Migration v1: snapshots and download jobs
const MIGRATION_V1: &[(&str, &str)] = &[
    (
        r#"
        CREATE TABLE content_snapshots (
            content_id TEXT PRIMARY KEY,
            raw_data TEXT NOT NULL,
            snapshot_key TEXT,
            comments_data TEXT,
            has_media INTEGER NOT NULL DEFAULT 0,
            has_video INTEGER NOT NULL DEFAULT 0,
            has_quoted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
        "Failed to create content_snapshots table",
    ),
    (
        r#"
        CREATE TABLE download_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            source_url TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'completed', 'failed', 'invalid')),
            task_type TEXT NOT NULL DEFAULT 'video',
            storage_key TEXT,
            error_message TEXT,
            metadata TEXT,
            size INTEGER,
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        )
        "#,
        "Failed to create download_jobs table",
    ),
    (
        "CREATE INDEX idx_download_jobs_owner ON download_jobs(owner, created_at DESC)",
        "Failed to create owner index",
    ),
];

/// Migration v2: claim bookkeeping
const MIGRATION_V2: &[(&str, &str)] = &[
    (
        "ALTER TABLE download_jobs ADD COLUMN worker_id TEXT",
        "Failed to add worker_id column",
    ),
    (
        "ALTER TABLE download_jobs ADD COLUMN claimed_at INTEGER",
        "Failed to add claimed_at column",
    ),
    (
        "CREATE INDEX idx_download_jobs_claim ON download_jobs(status, created_at, id)",
        "Failed to create claim index",
    ),
];

/// Migration v3: per-job source cookies, held only until the job finishes
const MIGRATION_V3: &[(&str, &str)] = &[(
    "ALTER TABLE download_jobs ADD COLUMN cookies TEXT",
    "Failed to add cookies column",
)];
