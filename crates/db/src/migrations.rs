use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Versions applied to `pool`, oldest first.
pub async fn applied_versions(pool: &DbPool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version",
    )
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{applied_versions, run_pending, MIGRATOR};
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &["draft_snapshot", "idx_draft_snapshot_written_at"];

    #[tokio::test]
    async fn migrations_create_draft_snapshot_table() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ?")
                .bind(*object)
                .fetch_one(&pool)
                .await
                .expect("check schema object")
                .get::<i64, _>("count");
            assert_eq!(count, 1, "{object} should exist after migrations");
        }

        let versions = applied_versions(&pool).await.expect("versions");
        assert_eq!(versions.len(), MIGRATOR.iter().count());
    }

    #[tokio::test]
    async fn rerunning_migrations_is_a_no_op() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        assert_eq!(applied_versions(&pool).await.expect("versions"), vec![1]);
    }
}
