use std::env;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::Duration;
use serde_json::Value;
use shipflow_cli::commands::{config, doctor, drafts, migrate};
use shipflow_core::config::{ConfigOverrides, LoadOptions};
use shipflow_core::{DraftStore, SaveOutcome, SystemClock, WorkflowState};
use shipflow_db::{connect, migrations, SqlDraftBackend};
use tempfile::TempDir;

const SESSION_KEY: &str = "shipflow.workflow_draft";

#[test]
fn migrate_returns_success_for_a_fresh_database() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[], || {
        let result = migrate::run(&options_for(dir.path()));
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_staleness() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[("SHIPFLOW_DRAFTS_STALENESS_SECS", "0")], || {
        let result = migrate::run(&options_for(dir.path()));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().expect("message");
        assert!(message.starts_with("configuration failure:"), "{message}");
    });
}

#[test]
fn drafts_inspect_reports_absent_slot_on_empty_database() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[], || {
        let result = drafts::inspect(&options_for(dir.path()));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "drafts inspect");
        assert_eq!(payload["details"]["snapshot"]["state"], "absent");
        assert_eq!(payload["details"]["rows"], Value::Array(Vec::new()));
    });
}

#[test]
fn drafts_inspect_reports_a_fresh_snapshot_without_consuming_it() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(dir.path());

    with_env(&[], || {
        for _ in 0..2 {
            let payload = parse_payload(&drafts::inspect(&options_for(dir.path())).output);
            assert_eq!(payload["status"], "ok");
            assert_eq!(payload["details"]["snapshot"]["state"], "fresh");
            assert_eq!(payload["details"]["snapshot"]["tier"], "sqlite");
            assert_eq!(payload["details"]["rows"][0]["snapshot_key"], SESSION_KEY);
        }
    });
}

#[test]
fn drafts_clear_removes_the_snapshot() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(dir.path());

    with_env(&[], || {
        let cleared = parse_payload(&drafts::clear(&options_for(dir.path())).output);
        assert_eq!(cleared["status"], "ok");
        assert_eq!(cleared["details"]["removed"], true);

        let again = parse_payload(&drafts::clear(&options_for(dir.path())).output);
        assert_eq!(again["details"]["removed"], false);

        let inspected = parse_payload(&drafts::inspect(&options_for(dir.path())).output);
        assert_eq!(inspected["details"]["snapshot"]["state"], "absent");
    });
}

#[test]
fn doctor_flags_an_undecodable_snapshot_until_cleared() {
    let dir = TempDir::new().expect("tempdir");
    seed_raw(dir.path(), "{not json");

    with_env(&[], || {
        let result = doctor::run(&options_for(dir.path()), true);
        assert_eq!(result.exit_code, 1);
        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check(&report, "draft_snapshot")["status"], "fail");
        assert_eq!(check(&report, "database_connectivity")["status"], "pass");

        drafts::clear(&options_for(dir.path()));

        let result = doctor::run(&options_for(dir.path()), true);
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["overall_status"], "pass");
    });
}

#[test]
fn doctor_skips_storage_checks_when_config_is_invalid() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[("SHIPFLOW_AUTH_GRACE_SECS", "-5")], || {
        let result = doctor::run(&options_for(dir.path()), true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(check(&report, "config_validation")["status"], "fail");
        assert_eq!(check(&report, "schema_migrations")["status"], "skipped");
    });
}

#[test]
fn doctor_reports_pending_migrations() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[], || {
        let report = parse_payload(&doctor::run(&options_for(dir.path()), true).output);
        assert_eq!(check(&report, "database_connectivity")["status"], "pass");
        assert_eq!(check(&report, "schema_migrations")["status"], "fail");
        assert_eq!(check(&report, "draft_snapshot")["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_lists_each_check() {
    let dir = TempDir::new().expect("tempdir");
    with_env(&[], || {
        assert_eq!(migrate::run(&options_for(dir.path())).exit_code, 0);
        let result = doctor::run(&options_for(dir.path()), false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] schema_migrations:"));
    });
}

#[test]
fn config_attributes_each_value_to_its_source() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("shipflow.toml");
    std::fs::write(&path, "[drafts]\nstaleness_secs = 900\n").expect("write config");

    with_env(&[("SHIPFLOW_LOG_LEVEL", "debug")], || {
        let mut options = options_for(dir.path());
        options.config_path = Some(path.clone());
        let output = config::run(&options);

        assert!(output.contains("- database.url = sqlite://"));
        assert!(output.contains("(source: flag)"));
        assert!(output.contains("- drafts.staleness_secs = 900 (source: file ("));
        assert!(output.contains("- logging.level = debug (source: env (SHIPFLOW_LOG_LEVEL))"));
        assert!(output.contains("- auth.grace_secs = 60 (source: default)"));
    });
}

fn options_for(dir: &Path) -> LoadOptions {
    LoadOptions {
        config_path: Some(dir.join("missing.toml")),
        require_file: false,
        overrides: ConfigOverrides {
            database_url: Some(database_url(dir)),
            ..ConfigOverrides::default()
        },
    }
}

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("shipflow.db").display())
}

fn seed_snapshot(dir: &Path) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        let pool = connect(&database_url(dir)).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let store = DraftStore::new(
            Arc::new(SqlDraftBackend::new(pool.clone())),
            SESSION_KEY,
            Duration::hours(1),
            Arc::new(SystemClock),
        );
        assert_eq!(store.save(&WorkflowState::new()).await, SaveOutcome::Primary);
        pool.close().await;
    });
}

fn seed_raw(dir: &Path, body: &str) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        let pool = connect(&database_url(dir)).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlDraftBackend::new(pool.clone()).upsert(SESSION_KEY, body).await.expect("upsert");
        pool.close().await;
    });
}

fn check<'a>(report: &'a Value, name: &str) -> &'a Value {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .expect("check present in report")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHIPFLOW_DATABASE_URL",
        "SHIPFLOW_DATABASE_MAX_CONNECTIONS",
        "SHIPFLOW_DATABASE_TIMEOUT_SECS",
        "SHIPFLOW_DRAFTS_SESSION_KEY",
        "SHIPFLOW_DRAFTS_STALENESS_SECS",
        "SHIPFLOW_DRAFTS_FALLBACK_ENABLED",
        "SHIPFLOW_DRAFTS_FALLBACK_QUOTA_BYTES",
        "SHIPFLOW_AUTH_GRACE_SECS",
        "SHIPFLOW_LOGGING_LEVEL",
        "SHIPFLOW_LOGGING_FORMAT",
        "SHIPFLOW_LOG_LEVEL",
        "SHIPFLOW_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();
    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
