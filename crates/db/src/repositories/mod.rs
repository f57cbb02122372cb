use thiserror::Error;

use shipflow_core::drafts::StorageError;

pub mod draft_snapshot;

pub use draft_snapshot::{SqlDraftBackend, StoredSnapshot};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StorageError {
    fn from(value: RepositoryError) -> Self {
        match &value {
            RepositoryError::Database(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            ) => StorageError::Unavailable(value.to_string()),
            _ => StorageError::Io(value.to_string()),
        }
    }
}
