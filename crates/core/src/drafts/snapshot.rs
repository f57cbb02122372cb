use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::state::WorkflowState;

/// Stored record: `{ "payload": <state>, "savedAtEpochMillis": <ms> }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub payload: Value,
    pub saved_at_epoch_millis: i64,
}

impl DraftSnapshot {
    pub fn capture(
        state: &WorkflowState,
        now_epoch_millis: i64,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self { payload: serde_json::to_value(state)?, saved_at_epoch_millis: now_epoch_millis })
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Elapsed time since the save; a timestamp in the future reads as zero.
    pub fn age(&self, now_epoch_millis: i64) -> Duration {
        let elapsed = now_epoch_millis.saturating_sub(self.saved_at_epoch_millis).max(0);
        Duration::milliseconds(elapsed)
    }

    pub fn is_stale(&self, now_epoch_millis: i64, horizon: Duration) -> bool {
        self.age(now_epoch_millis) > horizon
    }

    pub fn into_state(self) -> Result<WorkflowState, serde_json::Error> {
        serde_json::from_value(self.payload)
    }
}
