use std::sync::Arc;

use serde::Serialize;
use shipflow_core::config::{AppConfig, LoadOptions};
use shipflow_core::{DraftStore, SnapshotStatus, SystemClock};
use shipflow_db::{connect_from_config, migrations, DbPool, SqlDraftBackend};

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.extend(check_storage(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["database_connectivity", "schema_migrations", "draft_snapshot"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_storage(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("schema_migrations", "no async runtime"),
                DoctorCheck::skipped("draft_snapshot", "no async runtime"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_from_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("schema_migrations", "the database is unreachable"),
                    DoctorCheck::skipped("draft_snapshot", "the database is unreachable"),
                ];
            }
        };

        let mut checks = vec![DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        )];
        let migrated = check_migrations(&pool).await;
        let schema_ready = migrated.status == CheckStatus::Pass;
        checks.push(migrated);
        if schema_ready {
            checks.push(check_snapshot(config, pool.clone()).await);
        } else {
            checks.push(DoctorCheck::skipped("draft_snapshot", "migrations are pending"));
        }

        pool.close().await;
        checks
    })
}

async fn check_migrations(pool: &DbPool) -> DoctorCheck {
    let expected = migrations::MIGRATOR.iter().count();
    match migrations::applied_versions(pool).await {
        Ok(applied) if applied.len() >= expected => DoctorCheck::pass(
            "schema_migrations",
            format!("{} migration(s) applied", applied.len()),
        ),
        Ok(applied) => DoctorCheck::fail(
            "schema_migrations",
            format!(
                "{} of {expected} migration(s) applied; run `shipflow migrate`",
                applied.len()
            ),
        ),
        Err(_) => DoctorCheck::fail(
            "schema_migrations",
            "migration history not found; run `shipflow migrate`",
        ),
    }
}

async fn check_snapshot(config: &AppConfig, pool: DbPool) -> DoctorCheck {
    let store = DraftStore::from_config(
        &config.drafts,
        Arc::new(SqlDraftBackend::new(pool)),
        Arc::new(SystemClock),
    );

    match store.peek().await {
        Ok(SnapshotStatus::Absent) => DoctorCheck::pass("draft_snapshot", "no pending draft"),
        Ok(SnapshotStatus::Present { tier, age, stale: false, .. }) => DoctorCheck::pass(
            "draft_snapshot",
            format!("resumable draft in `{tier}` ({}s old)", age.num_seconds()),
        ),
        Ok(SnapshotStatus::Present { tier, age, stale: true, .. }) => DoctorCheck::pass(
            "draft_snapshot",
            format!(
                "stale draft in `{tier}` ({}s old) will be discarded on next resume",
                age.num_seconds()
            ),
        ),
        Ok(SnapshotStatus::Corrupt { tier }) => DoctorCheck::fail(
            "draft_snapshot",
            format!("draft in `{tier}` cannot be decoded; run `shipflow drafts clear`"),
        ),
        Err(error) => DoctorCheck::fail("draft_snapshot", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
