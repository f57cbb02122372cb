use serde_json::Value;

use crate::domain::draft::{is_blank, OrderRecord};

/// Shortest normalized source key accepted as the tail of a candidate.
pub const MIN_SUFFIX_LEN: usize = 3;

/// Lower-cases and strips everything that is not a letter or digit, so
/// `"Ship to Zip Code"`, `"ship_to_zip_code"` and `"SHIP-TO-ZIP-CODE"`
/// compare equal.
pub fn normalize_key(key: &str) -> String {
    key.chars().filter(|ch| ch.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

/// An order record indexed by normalized key, built once per resolution.
#[derive(Debug)]
pub struct NormalizedRecord<'a> {
    entries: Vec<(String, &'a str, &'a Value)>,
}

impl<'a> NormalizedRecord<'a> {
    pub fn new(record: &'a OrderRecord) -> Self {
        Self {
            entries: record
                .entries()
                .map(|(key, value)| (normalize_key(key), key, value))
                .collect(),
        }
    }

    /// Non-blank values whose key matches `candidate`, in record order.
    pub fn matches<'s>(
        &'s self,
        candidate: &str,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 's {
        let wanted = normalize_key(candidate);
        self.filtered(move |normalized| normalized == wanted)
    }

    /// Non-blank values whose key is the trailing part of `candidate`, so a
    /// bare `#ZipCode` answers for `Ship to Zip Code`. Exact keys are also
    /// suffixes; callers try [`Self::matches`] first.
    pub fn suffix_matches<'s>(
        &'s self,
        candidate: &str,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 's {
        let wanted = normalize_key(candidate);
        self.filtered(move |normalized| {
            normalized.len() >= MIN_SUFFIX_LEN && wanted.ends_with(normalized)
        })
    }

    fn filtered<'s>(
        &'s self,
        accept: impl Fn(&str) -> bool + 's,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 's {
        self.entries
            .iter()
            .filter(move |(normalized, _, value)| accept(normalized) && !is_blank(value))
            .map(|(_, original, value)| (*original, *value))
    }

    /// First non-blank value whose key matches `candidate`.
    pub fn lookup(&self, candidate: &str) -> Option<(&'a str, &'a Value)> {
        self.matches(candidate).next()
    }
}
