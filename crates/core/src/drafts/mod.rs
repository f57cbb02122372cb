//! One-shot persistence of the whole workflow state across an
//! authentication interruption.

pub mod backend;
pub mod snapshot;
pub mod store;

pub use backend::{DraftBackend, InMemoryDraftBackend, StorageError};
pub use snapshot::DraftSnapshot;
pub use store::{DraftStore, RestoreOutcome, SaveOutcome, SnapshotStatus};
