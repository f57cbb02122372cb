use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use shipflow_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_from_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

fn is_in_memory(url: &str) -> bool {
    url == ":memory:" || url.starts_with("sqlite::memory:")
}

/// Opens the pool, creating the database file on first use.
/// In-memory pools hold exactly one connection for their whole lifetime.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let url = if database_url == ":memory:" { "sqlite::memory:" } else { database_url };
    let options = url.parse::<SqliteConnectOptions>()?.create_if_missing(true);

    let pool = if is_in_memory(url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections.max(1))
    };

    pool.acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_in_memory};
    use crate::migrations::run_pending;

    #[test]
    fn memory_aliases_are_recognised() {
        assert!(is_in_memory(":memory:"));
        assert!(is_in_memory("sqlite::memory:"));
        assert!(!is_in_memory("sqlite://shipflow.db"));
    }

    #[tokio::test]
    async fn memory_pool_keeps_one_database_across_acquires() {
        let pool = connect_with_settings(":memory:", 5, 30).await.expect("connect");
        assert_eq!(pool.options().get_max_connections(), 1);
        run_pending(&pool).await.expect("run migrations");

        let (first, second) = tokio::join!(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM draft_snapshot").fetch_one(&pool),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM draft_snapshot").fetch_one(&pool),
        );
        assert_eq!(first.expect("first acquire"), 0);
        assert_eq!(second.expect("second acquire"), 0);

        for _ in 0..3 {
            let mut conn = pool.acquire().await.expect("acquire");
            sqlx::query(
                "INSERT OR REPLACE INTO draft_snapshot (snapshot_key, body, written_at)
                 VALUES (?, ?, ?)",
            )
            .bind("k")
            .bind("{}")
            .bind("2026-01-01T00:00:00Z")
            .execute(&mut *conn)
            .await
            .expect("write through a fresh acquire");
        }
        let rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM draft_snapshot")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(rows, 1);
    }
}
