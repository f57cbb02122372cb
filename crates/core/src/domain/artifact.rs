use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::step::StepId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Carrier rate the user picked on the quote step.
    SelectedQuote,
    /// Structured response returned when the bill of lading was generated.
    GeneratedDocumentResponse,
    /// Shipment reference (BOL / PRO number) issued with the document.
    GeneratedReferenceNumber,
    /// Carrier confirmation returned for a scheduled pickup.
    PickupConfirmation,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::SelectedQuote,
        ArtifactKind::GeneratedDocumentResponse,
        ArtifactKind::GeneratedReferenceNumber,
        ArtifactKind::PickupConfirmation,
    ];

    /// The only step whose completion may record this artifact.
    pub fn producer(self) -> StepId {
        match self {
            Self::SelectedQuote => StepId::RateQuote,
            Self::GeneratedDocumentResponse | Self::GeneratedReferenceNumber => {
                StepId::BillOfLading
            }
            Self::PickupConfirmation => StepId::PickupRequest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectedQuote => "selected_quote",
            Self::GeneratedDocumentResponse => "generated_document_response",
            Self::GeneratedReferenceNumber => "generated_reference_number",
            Self::PickupConfirmation => "pickup_confirmation",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind} is produced by {producer}; {attempted_by} cannot record it")]
pub struct ArtifactRejected {
    pub kind: ArtifactKind,
    pub producer: StepId,
    pub attempted_by: StepId,
}

/// Read-only outputs of completed steps, keyed by kind.
///
/// Writes are accepted only from the kind's producing step, so a later step
/// can read a document response but never replace it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactLedger {
    artifacts: BTreeMap<ArtifactKind, Value>,
}

impl ArtifactLedger {
    pub fn get(&self, kind: ArtifactKind) -> Option<&Value> {
        self.artifacts.get(&kind)
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.artifacts.contains_key(&kind)
    }

    /// Records an artifact on behalf of `step`, replacing an earlier value
    /// from the same producer (a revisited step may be resubmitted).
    pub fn record(
        &mut self,
        step: StepId,
        kind: ArtifactKind,
        value: Value,
    ) -> Result<Option<Value>, ArtifactRejected> {
        if kind.producer() != step {
            return Err(ArtifactRejected { kind, producer: kind.producer(), attempted_by: step });
        }
        Ok(self.artifacts.insert(kind, value))
    }

    /// Artifacts produced by `step`, in kind order.
    pub fn produced_by(&self, step: StepId) -> impl Iterator<Item = (ArtifactKind, &Value)> {
        self.artifacts
            .iter()
            .filter(move |(kind, _)| kind.producer() == step)
            .map(|(kind, value)| (*kind, value))
    }

    pub fn kinds(&self) -> impl Iterator<Item = ArtifactKind> + '_ {
        self.artifacts.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
