use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use shipflow_core::{
    DraftStore, LossOutcome, ManualClock, RestoreOutcome, ResumeOutcome, SaveOutcome,
    SnapshotStatus, StepId, WorkflowController,
};
use shipflow_db::{connect_with_settings, migrations, DbPool, SqlDraftBackend};

async fn open(dir: &TempDir) -> DbPool {
    let url = format!("sqlite://{}", dir.path().join("shipflow.db").display());
    let pool = connect_with_settings(&url, 2, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

fn store(pool: DbPool, clock: &ManualClock) -> DraftStore {
    DraftStore::new(
        Arc::new(SqlDraftBackend::new(pool)),
        "shipflow.workflow_draft",
        Duration::hours(1),
        Arc::new(clock.clone()),
    )
}

#[tokio::test]
async fn snapshot_survives_a_process_restart() {
    let dir = TempDir::new().expect("tempdir");
    let clock = ManualClock::default();

    {
        let pool = open(&dir).await;
        let mut controller = WorkflowController::new(store(pool.clone(), &clock));
        controller.authentication_recovered().await;
        controller.record_edit(StepId::RateQuote, "origin_zip", "89501").expect("edit");
        controller.advance().expect("advance");
        let saved = controller.authentication_lost().await;
        assert_eq!(saved, LossOutcome::Suspended(SaveOutcome::Primary));
        pool.close().await;
    }

    clock.advance(Duration::minutes(5));
    let pool = open(&dir).await;
    let store = store(pool.clone(), &clock);
    assert!(matches!(store.peek().await.expect("peek"), SnapshotStatus::Present { .. }));

    let mut controller = WorkflowController::new(store.clone());
    let resumed = controller.authentication_recovered().await;
    assert_eq!(resumed, ResumeOutcome::Restored { step: StepId::BillOfLading });
    assert!(controller.is_edited(StepId::RateQuote, "origin_zip"));

    assert_eq!(store.restore().await, RestoreOutcome::Absent);
    let remaining = SqlDraftBackend::new(pool).list().await.expect("list");
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn corrupt_row_is_removed_on_restore() {
    let dir = TempDir::new().expect("tempdir");
    let clock = ManualClock::default();
    let pool = open(&dir).await;
    let backend = SqlDraftBackend::new(pool.clone());
    backend.upsert("shipflow.workflow_draft", "{\"payload\":").await.expect("plant row");

    let store = store(pool, &clock);
    assert_eq!(store.restore().await, RestoreOutcome::Corrupt);
    assert!(backend.list().await.expect("list").is_empty());
}
