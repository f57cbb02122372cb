use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use shipflow_core::config::{AppConfig, DraftConfig, LoadOptions};
use shipflow_core::{ApplicationError, DraftStore, SnapshotStatus, StorageError, SystemClock};
use shipflow_db::{connect_from_config, migrations, DbPool, SqlDraftBackend};

use crate::commands::{load_config, runtime, CommandResult};

type Failure = (&'static str, String, u8);

fn storage_failure(error: impl Into<StorageError>) -> Failure {
    ("storage", ApplicationError::from(error.into()).to_string(), 6)
}

/// Reports the slot for the configured session key plus every stored row.
pub fn inspect(options: &LoadOptions) -> CommandResult {
    with_pool("drafts inspect", options, |config, pool| async move {
        let rows = SqlDraftBackend::new(pool.clone())
            .list()
            .await
            .map_err(storage_failure)?;
        let status = open_store(&config, pool)
            .peek()
            .await
            .map_err(storage_failure)?;

        let message = match &status {
            SnapshotStatus::Absent => "no draft snapshot for the session key".to_string(),
            SnapshotStatus::Present { stale: false, .. } => "resumable draft snapshot".to_string(),
            SnapshotStatus::Present { stale: true, .. } => "stale draft snapshot".to_string(),
            SnapshotStatus::Corrupt { .. } => "undecodable draft snapshot".to_string(),
        };
        let details = json!({
            "session_key": config.drafts.session_key,
            "staleness_secs": config.drafts.staleness_secs,
            "snapshot": describe(&status),
            "rows": rows,
        });
        Ok::<_, Failure>((message, Some(details)))
    })
}

/// Removes the snapshot for the configured session key.
pub fn clear(options: &LoadOptions) -> CommandResult {
    with_pool("drafts clear", options, |config, pool| async move {
        let store = open_store(&config, pool);
        let before = store.peek().await.map_err(storage_failure)?;
        store.clear().await;
        let after = store.peek().await.map_err(storage_failure)?;
        if after != SnapshotStatus::Absent {
            return Err(("storage", "draft snapshot could not be removed".to_string(), 6));
        }

        let removed = before != SnapshotStatus::Absent;
        tracing::info!(
            event_name = "cli.drafts.cleared",
            session_key = %config.drafts.session_key,
            removed,
            "draft snapshot cleared"
        );
        let message = if removed {
            format!("removed draft snapshot `{}`", config.drafts.session_key)
        } else {
            format!("no draft snapshot `{}` to remove", config.drafts.session_key)
        };
        Ok::<_, Failure>((message, Some(json!({ "removed": removed }))))
    })
}

// The in-process fallback tier is not reachable from here.
fn open_store(config: &AppConfig, pool: DbPool) -> DraftStore {
    let drafts = DraftConfig { fallback_enabled: false, ..config.drafts.clone() };
    DraftStore::from_config(&drafts, Arc::new(SqlDraftBackend::new(pool)), Arc::new(SystemClock))
}

fn describe(status: &SnapshotStatus) -> Value {
    match status {
        SnapshotStatus::Absent => json!({ "state": "absent" }),
        SnapshotStatus::Present { tier, saved_at_epoch_millis, age, stale } => json!({
            "state": if *stale { "stale" } else { "fresh" },
            "tier": tier,
            "saved_at": DateTime::<Utc>::from_timestamp_millis(*saved_at_epoch_millis)
                .map(|saved_at| saved_at.to_rfc3339()),
            "age_secs": age.num_seconds(),
        }),
        SnapshotStatus::Corrupt { tier } => json!({ "state": "corrupt", "tier": tier }),
    }
}

fn with_pool<F, Fut>(command: &str, options: &LoadOptions, body: F) -> CommandResult
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: std::future::Future<Output = Result<(String, Option<Value>), Failure>>,
{
    let config = match load_config(command, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let outcome = body(config, pool.clone()).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok((message, details)) => CommandResult::success_with_details(command, message, details),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}
