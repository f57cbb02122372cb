use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::DraftConfig;
use crate::domain::state::WorkflowState;
use crate::drafts::backend::{DraftBackend, InMemoryDraftBackend, StorageError};
use crate::drafts::snapshot::DraftSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Primary,
    Fallback,
    /// Every tier refused the write; the session continues without resume.
    Dropped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(Box<WorkflowState>),
    Absent,
    Stale { age: Duration },
    Corrupt,
}

impl RestoreOutcome {
    pub fn into_state(self) -> Option<WorkflowState> {
        match self {
            Self::Restored(state) => Some(*state),
            Self::Absent | Self::Stale { .. } | Self::Corrupt => None,
        }
    }

    pub fn is_restored(&self) -> bool {
        matches!(self, Self::Restored(_))
    }
}

/// What `peek` found, without consuming anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotStatus {
    Absent,
    Present { tier: String, saved_at_epoch_millis: i64, age: Duration, stale: bool },
    Corrupt { tier: String },
}

struct TierScan<'s> {
    found: Option<(&'s Arc<dyn DraftBackend>, String)>,
    unreadable: Vec<&'s Arc<dyn DraftBackend>>,
}

/// Single-slot snapshot store over a primary tier and an optional fallback.
///
/// `save` overwrites the slot (last writer wins). `restore` empties it,
/// whatever it found (first reader wins). Neither surfaces storage errors.
#[derive(Clone)]
pub struct DraftStore {
    primary: Arc<dyn DraftBackend>,
    fallback: Option<Arc<dyn DraftBackend>>,
    session_key: String,
    staleness: Duration,
    clock: Arc<dyn Clock>,
}

impl DraftStore {
    pub fn new(
        primary: Arc<dyn DraftBackend>,
        session_key: impl Into<String>,
        staleness: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { primary, fallback: None, session_key: session_key.into(), staleness, clock }
    }

    /// Store with the configured key and horizon; the fallback tier, when
    /// enabled, is an in-process backend capped at the configured quota.
    pub fn from_config(
        config: &DraftConfig,
        primary: Arc<dyn DraftBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let secs = i64::try_from(config.staleness_secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
        let staleness = Duration::seconds(secs);
        let store = Self::new(primary, config.session_key.clone(), staleness, clock);
        if config.fallback_enabled {
            let fallback =
                InMemoryDraftBackend::new("fallback").with_quota(config.fallback_quota_bytes);
            store.with_fallback(Arc::new(fallback))
        } else {
            store
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn DraftBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    pub async fn save(&self, state: &WorkflowState) -> SaveOutcome {
        let now = self.clock.now_epoch_millis();
        let body = match DraftSnapshot::capture(state, now).and_then(|snapshot| snapshot.encode())
        {
            Ok(body) => body,
            Err(error) => {
                warn!(
                    event_name = "drafts.snapshot.dropped",
                    session_key = %self.session_key,
                    error = %error,
                    "workflow state could not be serialized"
                );
                return SaveOutcome::Dropped;
            }
        };

        match self.primary.write(&self.session_key, &body).await {
            Ok(()) => {
                if let Some(fallback) = &self.fallback {
                    self.remove_quietly(fallback.as_ref()).await;
                }
                info!(
                    event_name = "drafts.snapshot.saved",
                    session_key = %self.session_key,
                    tier = self.primary.name(),
                    bytes = body.len(),
                    "draft snapshot saved"
                );
                return SaveOutcome::Primary;
            }
            Err(error) => warn!(
                event_name = "drafts.snapshot.primary_rejected",
                session_key = %self.session_key,
                tier = self.primary.name(),
                error = %error,
                "primary tier rejected draft snapshot"
            ),
        }

        let Some(fallback) = &self.fallback else {
            warn!(
                event_name = "drafts.snapshot.dropped",
                session_key = %self.session_key,
                "no fallback tier configured; resume is unavailable"
            );
            return SaveOutcome::Dropped;
        };

        match fallback.write(&self.session_key, &body).await {
            Ok(()) => {
                // An older snapshot may still sit in the primary tier.
                self.remove_quietly(self.primary.as_ref()).await;
                info!(
                    event_name = "drafts.snapshot.saved",
                    session_key = %self.session_key,
                    tier = fallback.name(),
                    bytes = body.len(),
                    "draft snapshot saved to fallback tier"
                );
                SaveOutcome::Fallback
            }
            Err(error) => {
                warn!(
                    event_name = "drafts.snapshot.dropped",
                    session_key = %self.session_key,
                    tier = fallback.name(),
                    error = %error,
                    "fallback tier rejected draft snapshot; resume is unavailable"
                );
                SaveOutcome::Dropped
            }
        }
    }

    /// One-shot: the snapshot is deleted from its tier before it is decoded,
    /// and a snapshot that cannot be deleted is never handed out. Tiers that
    /// could not be read are purged so a hidden snapshot cannot resurface on
    /// a later attempt.
    pub async fn restore(&self) -> RestoreOutcome {
        let scan = self.scan().await;
        for &tier in &scan.unreadable {
            self.purge_unreadable(tier.as_ref()).await;
        }

        let Some((source, body)) = scan.found else {
            debug!(
                event_name = "drafts.snapshot.absent",
                session_key = %self.session_key,
                "no draft snapshot to restore"
            );
            return RestoreOutcome::Absent;
        };

        if let Err(error) = source.remove(&self.session_key).await {
            warn!(
                event_name = "drafts.snapshot.consume_failed",
                session_key = %self.session_key,
                tier = source.name(),
                error = %error,
                "draft snapshot could not be consumed; resume skipped"
            );
            return RestoreOutcome::Absent;
        }
        for tier in self.tiers().filter(|tier| !Arc::ptr_eq(*tier, source)) {
            self.remove_quietly(tier.as_ref()).await;
        }
        let tier = source.name().to_string();

        let snapshot = match DraftSnapshot::decode(&body) {
            Ok(snapshot) => snapshot,
            Err(error) => return self.corrupt(&tier, &error.to_string()),
        };

        let now = self.clock.now_epoch_millis();
        if snapshot.is_stale(now, self.staleness) {
            let age = snapshot.age(now);
            info!(
                event_name = "drafts.snapshot.stale_discarded",
                session_key = %self.session_key,
                tier = %tier,
                age_secs = age.num_seconds(),
                "draft snapshot older than the staleness horizon was discarded"
            );
            return RestoreOutcome::Stale { age };
        }

        match snapshot.into_state() {
            Ok(state) if state.graph.is_consistent() => {
                info!(
                    event_name = "drafts.snapshot.restored",
                    session_key = %self.session_key,
                    tier = %tier,
                    step = %state.current_step(),
                    "draft snapshot restored"
                );
                RestoreOutcome::Restored(Box::new(state))
            }
            Ok(_) => self.corrupt(&tier, "step graph is inconsistent"),
            Err(error) => self.corrupt(&tier, &error.to_string()),
        }
    }

    /// Removes the snapshot from every tier; failures are logged only.
    pub async fn clear(&self) {
        for tier in self.tiers() {
            self.remove_quietly(tier.as_ref()).await;
        }
    }

    pub async fn peek(&self) -> Result<SnapshotStatus, StorageError> {
        let mut body =
            self.primary.read(&self.session_key).await?.map(|body| (self.primary.name(), body));
        if body.is_none() {
            if let Some(fallback) = &self.fallback {
                body =
                    fallback.read(&self.session_key).await?.map(|body| (fallback.name(), body));
            }
        }

        let Some((tier, body)) = body else {
            return Ok(SnapshotStatus::Absent);
        };

        Ok(match DraftSnapshot::decode(&body) {
            Ok(snapshot) => {
                let now = self.clock.now_epoch_millis();
                SnapshotStatus::Present {
                    tier: tier.to_string(),
                    saved_at_epoch_millis: snapshot.saved_at_epoch_millis,
                    age: snapshot.age(now),
                    stale: snapshot.is_stale(now, self.staleness),
                }
            }
            Err(_) => SnapshotStatus::Corrupt { tier: tier.to_string() },
        })
    }

    fn tiers(&self) -> impl Iterator<Item = &Arc<dyn DraftBackend>> {
        std::iter::once(&self.primary).chain(self.fallback.as_ref())
    }

    /// Reads tiers in order up to the first one holding the snapshot.
    async fn scan(&self) -> TierScan<'_> {
        let mut scan = TierScan { found: None, unreadable: Vec::new() };
        for tier in self.tiers() {
            match tier.read(&self.session_key).await {
                Ok(Some(body)) => {
                    scan.found = Some((tier, body));
                    break;
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        event_name = "drafts.snapshot.read_failed",
                        session_key = %self.session_key,
                        tier = tier.name(),
                        error = %error,
                        "draft tier could not be read"
                    );
                    scan.unreadable.push(tier);
                }
            }
        }
        scan
    }

    async fn purge_unreadable(&self, backend: &dyn DraftBackend) {
        if let Err(error) = backend.remove(&self.session_key).await {
            warn!(
                event_name = "drafts.snapshot.consume_failed",
                session_key = %self.session_key,
                tier = backend.name(),
                error = %error,
                "unreadable draft tier could not be purged"
            );
        }
    }

    async fn remove_quietly(&self, backend: &dyn DraftBackend) {
        if let Err(error) = backend.remove(&self.session_key).await {
            warn!(
                event_name = "drafts.snapshot.remove_failed",
                session_key = %self.session_key,
                tier = backend.name(),
                error = %error,
                "draft snapshot could not be removed"
            );
        }
    }

    fn corrupt(&self, tier: &str, reason: &str) -> RestoreOutcome {
        warn!(
            event_name = "drafts.snapshot.corrupt_discarded",
            session_key = %self.session_key,
            tier = %tier,
            reason = %reason,
            "unreadable draft snapshot was discarded"
        );
        RestoreOutcome::Corrupt
    }
}
