use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;

use shipflow_core::drafts::{DraftBackend, StorageError};

use super::RepositoryError;
use crate::DbPool;

/// Durable draft tier backed by the `draft_snapshot` table.
pub struct SqlDraftBackend {
    pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredSnapshot {
    pub snapshot_key: String,
    pub bytes: usize,
    pub written_at: DateTime<Utc>,
}

impl SqlDraftBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, key: &str, body: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO draft_snapshot (snapshot_key, body, written_at)
             VALUES (?, ?, ?)
             ON CONFLICT(snapshot_key) DO UPDATE SET
                body = excluded.body,
                written_at = excluded.written_at",
        )
        .bind(key)
        .bind(body)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_body(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT body FROM draft_snapshot WHERE snapshot_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get("body").map_err(|e| RepositoryError::Decode(e.to_string())))
            .transpose()
    }

    pub async fn delete(&self, key: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM draft_snapshot WHERE snapshot_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Every stored snapshot, newest first; bodies are not loaded.
    pub async fn list(&self) -> Result<Vec<StoredSnapshot>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT snapshot_key, LENGTH(CAST(body AS BLOB)) AS bytes, written_at
             FROM draft_snapshot
             ORDER BY written_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_stored).collect()
    }
}

fn row_to_stored(row: &sqlx::sqlite::SqliteRow) -> Result<StoredSnapshot, RepositoryError> {
    let snapshot_key: String =
        row.try_get("snapshot_key").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bytes: i64 = row.try_get("bytes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let written_at_str: String =
        row.try_get("written_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let written_at = DateTime::parse_from_rfc3339(&written_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("written_at `{written_at_str}`: {e}")))?;

    Ok(StoredSnapshot {
        snapshot_key,
        bytes: usize::try_from(bytes).unwrap_or_default(),
        written_at,
    })
}

#[async_trait]
impl DraftBackend for SqlDraftBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn write(&self, key: &str, body: &str) -> Result<(), StorageError> {
        self.upsert(key, body).await.map_err(StorageError::from)
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.find_body(key).await.map_err(StorageError::from)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.delete(key).await.map(|_| ()).map_err(StorageError::from)
    }
}

#[cfg(test)]
mod tests {
    use shipflow_core::drafts::{DraftBackend, StorageError};

    use super::SqlDraftBackend;
    use crate::{connect_with_settings, migrations};

    async fn backend() -> SqlDraftBackend {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlDraftBackend::new(pool)
    }

    #[tokio::test]
    async fn write_overwrites_the_single_slot() {
        let backend = backend().await;

        backend.write("shipflow.workflow_draft", "{\"v\":1}").await.expect("first write");
        backend.write("shipflow.workflow_draft", "{\"v\":2}").await.expect("overwrite");

        assert_eq!(
            backend.read("shipflow.workflow_draft").await.expect("read").as_deref(),
            Some("{\"v\":2}")
        );
        let listed = backend.list().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].bytes, 7);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let backend = backend().await;
        backend.write("k", "body").await.expect("write");

        backend.remove("k").await.expect("remove");
        backend.remove("k").await.expect("remove again");

        assert_eq!(backend.read("k").await.expect("read"), None);
        assert_eq!(backend.delete("k").await.expect("delete"), 0);
    }

    #[tokio::test]
    async fn closed_pool_reports_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let backend = SqlDraftBackend::new(pool.clone());
        pool.close().await;

        let error = backend.read("k").await.expect_err("closed pool");
        assert!(matches!(error, StorageError::Unavailable(_)));
    }
}
