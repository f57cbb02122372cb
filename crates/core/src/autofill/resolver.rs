use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::autofill::keys::NormalizedRecord;
use crate::autofill::rules::AutoPopulationRule;
use crate::domain::draft::{is_blank, Draft, OrderRecord};
use crate::tracking::FieldEditTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The draft already shows a value for the field.
    TargetFilled,
    /// The user touched the field, even if it is blank now.
    UserEdited,
    /// An earlier rule in the same pass already wrote the field.
    TargetAlreadyPatched,
    /// No candidate produced a non-blank value.
    NoCandidate,
}

/// The gate every automatic write passes through: the field must be blank
/// in the draft and absent from the tracker.
pub fn population_gate(
    draft: &Draft,
    tracker: &FieldEditTracker,
    field_name: &str,
) -> Option<SkipReason> {
    if !draft.is_field_blank(field_name) {
        return Some(SkipReason::TargetFilled);
    }
    if tracker.is_edited(field_name) {
        return Some(SkipReason::UserEdited);
    }
    None
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchWrite {
    pub field: String,
    pub value: Value,
    /// Index of the rule (or carry mapping) that produced the write.
    pub rule_index: usize,
    /// Where the value came from: the matched record key, or an
    /// artifact path for carried-forward values.
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRule {
    pub rule_index: usize,
    pub field: String,
    pub reason: SkipReason,
}

/// Field writes computed against one draft, not yet applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutofillPatch {
    pub writes: Vec<PatchWrite>,
    pub skipped: Vec<SkippedRule>,
}

impl AutofillPatch {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.writes.iter().find(|write| write.field == field).map(|write| &write.value)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.writes.iter().map(|write| write.field.as_str())
    }

    pub fn is_patched(&self, field: &str) -> bool {
        self.writes.iter().any(|write| write.field == field)
    }

    pub(crate) fn push_write(
        &mut self,
        rule_index: usize,
        field: &str,
        value: Value,
        source: impl Into<String>,
    ) {
        self.writes.push(PatchWrite {
            field: field.to_owned(),
            value,
            rule_index,
            source: source.into(),
        });
    }

    pub(crate) fn push_skip(&mut self, rule_index: usize, field: &str, reason: SkipReason) {
        self.skipped.push(SkippedRule { rule_index, field: field.to_owned(), reason });
    }

    /// Writes every patched field into `draft`; returns the number written.
    pub fn apply_to(&self, draft: &mut Draft) -> usize {
        for write in &self.writes {
            draft.set(write.field.clone(), write.value.clone());
        }
        self.writes.len()
    }

    /// Appends `other`'s writes for fields this patch does not touch yet.
    pub fn merge(&mut self, other: AutofillPatch) {
        for write in other.writes {
            if !self.is_patched(&write.field) {
                self.writes.push(write);
            }
        }
        self.skipped.extend(other.skipped);
    }
}

/// Computes population patches; holds no state of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoPopulationResolver;

impl AutoPopulationResolver {
    /// Evaluates `rules` in order against `source` for `draft`.
    ///
    /// Inputs are never mutated, and the result only depends on them, so
    /// repeating the call after applying the patch yields an empty patch.
    pub fn apply(
        &self,
        source: &OrderRecord,
        draft: &Draft,
        rules: &[AutoPopulationRule],
        tracker: &FieldEditTracker,
    ) -> AutofillPatch {
        let index = NormalizedRecord::new(source);
        let mut patch = AutofillPatch::default();
        let mut settled: BTreeSet<&str> = BTreeSet::new();

        for (rule_index, rule) in rules.iter().enumerate() {
            let field = rule.target_field_name.as_str();

            if settled.contains(field) {
                patch.push_skip(rule_index, field, SkipReason::TargetAlreadyPatched);
                continue;
            }
            if let Some(reason) = population_gate(draft, tracker, field) {
                patch.push_skip(rule_index, field, reason);
                continue;
            }

            match first_candidate(&index, rule) {
                Some((source_key, value)) => {
                    settled.insert(field);
                    patch.push_write(rule_index, field, value, source_key);
                }
                None => patch.push_skip(rule_index, field, SkipReason::NoCandidate),
            }
        }

        patch
    }
}

/// Exact key matches across every candidate come first; only then may a
/// shorter source key stand in for the tail of a candidate.
fn first_candidate<'a>(
    index: &NormalizedRecord<'a>,
    rule: &AutoPopulationRule,
) -> Option<(&'a str, Value)> {
    let usable = |(key, raw): (&'a str, &'a Value)| {
        let value = rule.transformed(raw);
        (!is_blank(&value)).then_some((key, value))
    };

    rule.source_key_candidates
        .iter()
        .find_map(|candidate| index.matches(candidate).find_map(usable))
        .or_else(|| {
            rule.source_key_candidates
                .iter()
                .find_map(|candidate| index.suffix_matches(candidate).find_map(usable))
        })
}
