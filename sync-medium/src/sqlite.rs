//! SQLite-backed transfer medium.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sync_engine::{MediumError, PullResponse, TransferMedium};
use sync_types::ResType;

/// Default lifetime of a queued payload (7 days).
pub const DEFAULT_PAYLOAD_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Transfer medium keeping its queues in one SQLite database.
///
/// Every `(resource, sub-resource, full|incremental)` triple is a FIFO
/// queue ordered by an autoincrement sequence. A pulled payload is marked
/// delivered; the next pull with `ack` set removes the oldest delivered
/// payload of that queue.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteMedium {
    pool: SqlitePool,
    payload_ttl: Duration,
}

impl SqliteMedium {
    /// Open (or create) the medium database at `path`.
    pub async fn new(path: &Path, payload_ttl: Duration) -> StorageResult<Self> {
        let url = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(url)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let medium = Self { pool, payload_ttl };
        medium.run_migrations().await?;
        tracing::info!("Opened transfer medium at {}", path.display());
        Ok(medium)
    }

    /// Create an in-memory medium (for testing).
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let medium = Self {
            pool,
            payload_ttl: DEFAULT_PAYLOAD_TTL,
        };
        medium.run_migrations().await?;
        Ok(medium)
    }

    /// Replace the payload lifetime used for new pushes.
    pub fn with_payload_ttl(mut self, payload_ttl: Duration) -> Self {
        self.payload_ttl = payload_ttl;
        self
    }

    async fn run_migrations(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payloads (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                res_type TEXT NOT NULL,
                sub_res TEXT NOT NULL,
                is_increment INTEGER NOT NULL,
                payload BLOB NOT NULL,
                delivered INTEGER NOT NULL DEFAULT 0,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_payloads_queue ON payloads(res_type, sub_res, is_increment, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_payloads_expires ON payloads(expires_at)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(())
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Append a payload to its queue.
    pub async fn enqueue(
        &self,
        res_type: ResType,
        sub_res: &str,
        is_increment: bool,
        payload: &[u8],
    ) -> StorageResult<()> {
        let expires_at = Self::current_timestamp() + self.payload_ttl.as_secs() as i64;

        sqlx::query(
            r#"
            INSERT INTO payloads (res_type, sub_res, is_increment, payload, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(res_type.as_str())
        .bind(sub_res)
        .bind(is_increment)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(())
    }

    /// Drop the acknowledged head if `ack`, then return the live head and
    /// the number of live payloads in the queue.
    pub async fn dequeue(
        &self,
        res_type: ResType,
        sub_res: &str,
        is_increment: bool,
        ack: bool,
    ) -> StorageResult<(Option<Vec<u8>>, u64)> {
        let now = Self::current_timestamp();
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        if ack {
            sqlx::query(
                r#"
                DELETE FROM payloads WHERE seq = (
                    SELECT MIN(seq) FROM payloads
                    WHERE res_type = ?1 AND sub_res = ?2 AND is_increment = ?3 AND delivered = 1
                )
                "#,
            )
            .bind(res_type.as_str())
            .bind(sub_res)
            .bind(is_increment)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;
        }

        let head: Option<(i64, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT seq, payload FROM payloads
            WHERE res_type = ?1 AND sub_res = ?2 AND is_increment = ?3 AND expires_at > ?4
            ORDER BY seq ASC
            LIMIT 1
            "#,
        )
        .bind(res_type.as_str())
        .bind(sub_res)
        .bind(is_increment)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM payloads
            WHERE res_type = ?1 AND sub_res = ?2 AND is_increment = ?3 AND expires_at > ?4
            "#,
        )
        .bind(res_type.as_str())
        .bind(sub_res)
        .bind(is_increment)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        let payload = match head {
            Some((seq, payload)) => {
                sqlx::query("UPDATE payloads SET delivered = 1 WHERE seq = ?1")
                    .bind(seq)
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::Database)?;
                Some(payload)
            }
            None => None,
        };

        tx.commit().await.map_err(StorageError::Database)?;
        Ok((payload, count as u64))
    }

    /// Number of live payloads in a queue.
    pub async fn queued(&self, res_type: ResType, sub_res: &str, is_increment: bool) -> StorageResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM payloads
            WHERE res_type = ?1 AND sub_res = ?2 AND is_increment = ?3 AND expires_at > ?4
            "#,
        )
        .bind(res_type.as_str())
        .bind(sub_res)
        .bind(is_increment)
        .bind(Self::current_timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(count as u64)
    }

    /// Rows stored, expired ones included.
    #[cfg(test)]
    pub(crate) async fn stored_rows(&self) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payloads")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(count)
    }

    /// Delete every expired payload. Returns the number deleted.
    pub async fn cleanup_expired(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM payloads WHERE expires_at <= ?1")
            .bind(Self::current_timestamp())
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TransferMedium for SqliteMedium {
    async fn push(
        &self,
        res_type: ResType,
        sub_res: &str,
        is_increment: bool,
        payload: Vec<u8>,
    ) -> Result<(), MediumError> {
        self.enqueue(res_type, sub_res, is_increment, &payload).await?;
        Ok(())
    }

    async fn pull(
        &self,
        res_type: ResType,
        sub_res: &str,
        is_increment: bool,
        ack: bool,
    ) -> Result<PullResponse, MediumError> {
        let (payload, total_remaining) = self.dequeue(res_type, sub_res, is_increment, ack).await?;
        Ok(PullResponse {
            total_remaining,
            payload,
        })
    }
}
