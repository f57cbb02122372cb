use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::artifact::ArtifactLedger;
use crate::domain::draft::Draft;
use crate::domain::step::StepId;
use crate::flows::StepGraph;
use crate::tracking::FieldEditTracker;

/// Root aggregate for one shipment-creation session.
///
/// Owned by a single `WorkflowController`; the whole value is what a draft
/// snapshot serializes and what a restore replaces.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub graph: StepGraph,
    #[serde(default)]
    pub step_drafts: BTreeMap<StepId, Draft>,
    #[serde(default)]
    pub carried_artifacts: ArtifactLedger,
    #[serde(default)]
    pub edit_trackers: BTreeMap<StepId, FieldEditTracker>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_step(&self) -> StepId {
        self.graph.current()
    }

    pub fn draft(&self, step: StepId) -> Option<&Draft> {
        self.step_drafts.get(&step)
    }

    pub fn draft_mut(&mut self, step: StepId) -> &mut Draft {
        self.step_drafts.entry(step).or_default()
    }

    pub fn tracker(&self, step: StepId) -> Option<&FieldEditTracker> {
        self.edit_trackers.get(&step)
    }

    pub fn tracker_mut(&mut self, step: StepId) -> &mut FieldEditTracker {
        self.edit_trackers.entry(step).or_default()
    }

    /// Split borrow of one step's draft and tracker.
    pub fn slice_mut(&mut self, step: StepId) -> (&mut Draft, &mut FieldEditTracker) {
        let draft = self.step_drafts.entry(step).or_default();
        let tracker = self.edit_trackers.entry(step).or_default();
        (draft, tracker)
    }
}
