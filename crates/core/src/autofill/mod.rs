//! Automatic population of draft fields from order data.
//!
//! Writes land only in fields that are blank and that the user has never
//! edited; see [`resolver::population_gate`].

pub mod keys;
pub mod presets;
pub mod resolver;
pub mod rules;

pub use keys::{normalize_key, NormalizedRecord};
pub use presets::RuleBook;
pub use resolver::{
    population_gate, AutoPopulationResolver, AutofillPatch, PatchWrite, SkipReason, SkippedRule,
};
pub use rules::{AutoPopulationRule, FieldTransform};
