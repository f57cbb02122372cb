//! Seeds a step's draft from artifacts recorded by earlier steps.
//!
//! Carried values pass through the same gate as order-data population, so
//! revisiting a step never overwrites what the user already typed.

use serde::{Deserialize, Serialize};

use crate::autofill::resolver::{population_gate, AutofillPatch, SkipReason};
use crate::autofill::rules::FieldTransform;
use crate::domain::artifact::{ArtifactKind, ArtifactLedger};
use crate::domain::draft::{is_blank, Draft};
use crate::domain::step::StepId;
use crate::tracking::FieldEditTracker;

/// One artifact path copied into one destination field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryMapping {
    pub target_step: StepId,
    pub artifact: ArtifactKind,
    /// JSON pointer into the artifact; empty for the whole value.
    pub pointer: String,
    pub target_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<FieldTransform>,
}

impl CarryMapping {
    pub fn new(
        target_step: StepId,
        artifact: ArtifactKind,
        pointer: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            target_step,
            artifact,
            pointer: pointer.into(),
            target_field: target_field.into(),
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: FieldTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    fn source_label(&self) -> String {
        format!("{}{}", self.artifact, self.pointer)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryForwardBridge {
    mappings: Vec<CarryMapping>,
}

impl Default for CarryForwardBridge {
    fn default() -> Self {
        Self::standard()
    }
}

impl CarryForwardBridge {
    pub fn new(mappings: Vec<CarryMapping>) -> Self {
        Self { mappings }
    }

    /// Mappings for the freight workflow: quote selection into the bill of
    /// lading, document response into the pickup request, and every
    /// reference number into the summary.
    pub fn standard() -> Self {
        use ArtifactKind::{
            GeneratedDocumentResponse, GeneratedReferenceNumber, PickupConfirmation, SelectedQuote,
        };
        use StepId::{BillOfLading, PickupRequest, Summary};

        let map = CarryMapping::new;
        Self::new(vec![
            map(BillOfLading, SelectedQuote, "/quoteNumber", "quote_number"),
            map(BillOfLading, SelectedQuote, "/carrier/scac", "carrier_scac"),
            map(BillOfLading, SelectedQuote, "/formData/originCity", "shipper_city"),
            map(BillOfLading, SelectedQuote, "/formData/originState", "shipper_state")
                .with_transform(FieldTransform::Uppercase),
            map(BillOfLading, SelectedQuote, "/formData/originZip", "shipper_zip")
                .with_transform(FieldTransform::PostalCode),
            map(BillOfLading, SelectedQuote, "/formData/destinationCity", "consignee_city"),
            map(BillOfLading, SelectedQuote, "/formData/destinationState", "consignee_state")
                .with_transform(FieldTransform::Uppercase),
            map(BillOfLading, SelectedQuote, "/formData/destinationZip", "consignee_zip")
                .with_transform(FieldTransform::PostalCode),
            map(BillOfLading, SelectedQuote, "/formData/weight", "total_weight"),
            map(BillOfLading, SelectedQuote, "/formData/pieces", "piece_count"),
            map(PickupRequest, GeneratedReferenceNumber, "", "bol_number"),
            map(PickupRequest, GeneratedDocumentResponse, "/proNumber", "pro_number"),
            map(PickupRequest, GeneratedDocumentResponse, "/shipper/name", "pickup_contact_name"),
            map(PickupRequest, GeneratedDocumentResponse, "/shipper/phone", "pickup_contact_phone")
                .with_transform(FieldTransform::DigitsOnly),
            map(PickupRequest, GeneratedDocumentResponse, "/shipper/address1", "pickup_address1"),
            map(PickupRequest, GeneratedDocumentResponse, "/shipper/city", "pickup_city"),
            map(PickupRequest, GeneratedDocumentResponse, "/shipper/state", "pickup_state"),
            map(PickupRequest, GeneratedDocumentResponse, "/shipper/zip", "pickup_zip")
                .with_transform(FieldTransform::PostalCode),
            map(PickupRequest, SelectedQuote, "/formData/weight", "total_weight"),
            map(PickupRequest, SelectedQuote, "/quoteNumber", "quote_number"),
            map(Summary, SelectedQuote, "/quoteNumber", "quote_number"),
            map(Summary, SelectedQuote, "/totalCharge", "quoted_total"),
            map(Summary, GeneratedReferenceNumber, "", "bol_number"),
            map(Summary, GeneratedDocumentResponse, "/proNumber", "pro_number"),
            map(Summary, GeneratedDocumentResponse, "/documentUrl", "bol_document_url"),
            map(Summary, PickupConfirmation, "/confirmationNumber", "pickup_confirmation_number"),
            map(Summary, PickupConfirmation, "/pickupDate", "pickup_date"),
        ])
    }

    pub fn mappings_into(&self, step: StepId) -> impl Iterator<Item = &CarryMapping> {
        self.mappings.iter().filter(move |mapping| mapping.target_step == step)
    }

    /// Computes the writes for the step that follows `completed`.
    ///
    /// Returns an empty patch for the terminal step. Mappings whose
    /// artifact comes from a step at or after the target are ignored, so a
    /// step can only read what earlier steps produced.
    pub fn plan(
        &self,
        completed: StepId,
        artifacts: &ArtifactLedger,
        next_draft: &Draft,
        tracker: &FieldEditTracker,
    ) -> AutofillPatch {
        let mut patch = AutofillPatch::default();
        let Some(target) = completed.next() else {
            return patch;
        };

        for (index, mapping) in self.mappings.iter().enumerate() {
            if mapping.target_step != target || mapping.artifact.producer() >= target {
                continue;
            }
            let field = mapping.target_field.as_str();

            if patch.is_patched(field) {
                patch.push_skip(index, field, SkipReason::TargetAlreadyPatched);
                continue;
            }
            if let Some(reason) = population_gate(next_draft, tracker, field) {
                patch.push_skip(index, field, reason);
                continue;
            }

            let value = artifacts
                .get(mapping.artifact)
                .and_then(|artifact| artifact.pointer(&mapping.pointer))
                .map(|raw| match mapping.transform {
                    Some(transform) => transform.apply(raw),
                    None => raw.clone(),
                })
                .filter(|value| !is_blank(value));

            match value {
                Some(value) => patch.push_write(index, field, value, mapping.source_label()),
                None => patch.push_skip(index, field, SkipReason::NoCandidate),
            }
        }

        patch
    }

    /// Returns `next_draft` with the carried values applied.
    pub fn seed(
        &self,
        completed: StepId,
        artifacts: &ArtifactLedger,
        next_draft: &Draft,
        tracker: &FieldEditTracker,
    ) -> Draft {
        let mut seeded = next_draft.clone();
        self.plan(completed, artifacts, next_draft, tracker).apply_to(&mut seeded);
        seeded
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{CarryForwardBridge, CarryMapping};
    use crate::autofill::resolver::SkipReason;
    use crate::domain::artifact::{ArtifactKind, ArtifactLedger};
    use crate::domain::draft::Draft;
    use crate::domain::step::StepId;
    use crate::tracking::FieldEditTracker;

    fn selected_quote() -> Value {
        json!({
            "quoteNumber": "Q-77",
            "totalCharge": 412.5,
            "carrier": {"scac": "ODFL"},
            "formData": {
                "originZip": "89501",
                "originCity": "Reno",
                "originState": "nv",
                "destinationZip": "22202-4321",
                "destinationCity": "Arlington",
                "destinationState": "va",
                "weight": 850,
                "pieces": 2
            }
        })
    }

    fn ledger() -> ArtifactLedger {
        let mut ledger = ArtifactLedger::default();
        ledger
            .record(StepId::RateQuote, ArtifactKind::SelectedQuote, selected_quote())
            .expect("record quote");
        ledger
    }

    #[test]
    fn quote_selection_seeds_bill_of_lading() {
        let seeded = CarryForwardBridge::standard().seed(
            StepId::RateQuote,
            &ledger(),
            &Draft::new(),
            &FieldEditTracker::new(),
        );

        assert_eq!(seeded.get_str("consignee_city"), Some("Arlington"));
        assert_eq!(seeded.get_str("consignee_state"), Some("VA"));
        assert_eq!(seeded.get_str("consignee_zip"), Some("22202"));
        assert_eq!(seeded.get_str("quote_number"), Some("Q-77"));
        assert_eq!(seeded.get("total_weight"), Some(&json!(850)));
    }

    #[test]
    fn carried_values_respect_the_population_gate() {
        let draft = Draft::new().with_field("consignee_city", "Alexandria");
        let mut tracker = FieldEditTracker::new();
        tracker.mark_edited("quote_number");

        let patch =
            CarryForwardBridge::standard().plan(StepId::RateQuote, &ledger(), &draft, &tracker);

        assert_eq!(patch.get("consignee_city"), None);
        assert_eq!(patch.get("quote_number"), None);
        let reason_for = |field: &str| {
            patch.skipped.iter().find(|skip| skip.field == field).map(|skip| skip.reason)
        };
        assert_eq!(reason_for("consignee_city"), Some(SkipReason::TargetFilled));
        assert_eq!(reason_for("quote_number"), Some(SkipReason::UserEdited));
    }

    #[test]
    fn reference_number_is_carried_as_a_whole_value() {
        let mut ledger = ledger();
        ledger
            .record(StepId::BillOfLading, ArtifactKind::GeneratedReferenceNumber, json!("BOL-5531"))
            .expect("record reference");
        ledger
            .record(
                StepId::BillOfLading,
                ArtifactKind::GeneratedDocumentResponse,
                json!({"proNumber": "PRO-1", "shipper": {"name": "Dock 4", "zip": "89501"}}),
            )
            .expect("record document");

        let seeded = CarryForwardBridge::standard().seed(
            StepId::BillOfLading,
            &ledger,
            &Draft::new(),
            &FieldEditTracker::new(),
        );

        assert_eq!(seeded.get_str("bol_number"), Some("BOL-5531"));
        assert_eq!(seeded.get_str("pro_number"), Some("PRO-1"));
        assert_eq!(seeded.get_str("pickup_contact_name"), Some("Dock 4"));
        assert_eq!(seeded.get_str("quote_number"), Some("Q-77"));
    }

    #[test]
    fn terminal_step_has_nothing_to_seed() {
        let patch = CarryForwardBridge::standard().plan(
            StepId::Summary,
            &ledger(),
            &Draft::new(),
            &FieldEditTracker::new(),
        );
        assert!(patch.is_empty());
        assert!(patch.skipped.is_empty());
    }

    #[test]
    fn mappings_reading_later_artifacts_are_ignored() {
        let bridge = CarryForwardBridge::new(vec![CarryMapping::new(
            StepId::BillOfLading,
            ArtifactKind::PickupConfirmation,
            "/confirmationNumber",
            "confirmation",
        )]);
        let mut ledger = ArtifactLedger::default();
        ledger
            .record(
                StepId::PickupRequest,
                ArtifactKind::PickupConfirmation,
                json!({"confirmationNumber": "PU-1"}),
            )
            .expect("record confirmation");

        let patch =
            bridge.plan(StepId::RateQuote, &ledger, &Draft::new(), &FieldEditTracker::new());
        assert!(patch.is_empty());
    }
}
