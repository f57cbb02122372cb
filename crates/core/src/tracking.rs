//! Evidence of explicit user edits, one tracker per destination draft.
//!
//! A tracker replaces per-field "already auto-filled" flags with a single
//! set: once a field name is recorded it stays recorded for the lifetime of
//! the draft, even if the user clears the value again.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEditTracker {
    edited_field_names: BTreeSet<String>,
}

impl FieldEditTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn mark_edited(&mut self, field_name: impl Into<String>) {
        self.edited_field_names.insert(field_name.into());
    }

    pub fn is_edited(&self, field_name: &str) -> bool {
        self.edited_field_names.contains(field_name)
    }

    /// Only for a brand-new entity; a resumed draft keeps its tracker.
    pub fn reset(&mut self) {
        self.edited_field_names.clear();
    }

    pub fn edited_fields(&self) -> impl Iterator<Item = &str> {
        self.edited_field_names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.edited_field_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edited_field_names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FieldEditTracker {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { edited_field_names: iter.into_iter().map(Into::into).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::FieldEditTracker;

    #[test]
    fn marking_is_idempotent() {
        let mut tracker = FieldEditTracker::new();
        tracker.mark_edited("city");
        tracker.mark_edited("city");

        assert!(tracker.is_edited("city"));
        assert!(!tracker.is_edited("state"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn reset_clears_all_evidence() {
        let mut tracker: FieldEditTracker = ["city", "zip"].into_iter().collect();
        tracker.reset();

        assert!(tracker.is_empty());
        assert!(!tracker.is_edited("zip"));
    }

    #[test]
    fn edited_fields_are_listed_in_name_order() {
        let tracker: FieldEditTracker = ["zip", "city"].into_iter().collect();
        assert_eq!(tracker.edited_fields().collect::<Vec<_>>(), vec!["city", "zip"]);
    }
}
