use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("write of {needed} bytes exceeds the {limit} byte quota")]
    QuotaExceeded { needed: usize, limit: usize },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
}

/// A key/value tier that can hold draft snapshots.
#[async_trait]
pub trait DraftBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Overwrites whatever is stored under `key`.
    async fn write(&self, key: &str, body: &str) -> Result<(), StorageError>;

    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local tier with an optional byte quota across all keys.
#[derive(Clone)]
pub struct InMemoryDraftBackend {
    name: String,
    entries: Arc<RwLock<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
    offline: Arc<AtomicBool>,
    failing_reads: Arc<AtomicBool>,
    failing_removes: Arc<AtomicBool>,
}

impl Default for InMemoryDraftBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl InMemoryDraftBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
            quota_bytes: None,
            offline: Arc::new(AtomicBool::new(false)),
            failing_reads: Arc::new(AtomicBool::new(false)),
            failing_removes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// While offline every operation fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reads fail with `Io` while set; writes and removes still work.
    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Removes fail with `Unavailable` while set; reads and writes still work.
    pub fn set_failing_removes(&self, failing: bool) {
        self.failing_removes.store(failing, Ordering::SeqCst);
    }

    pub async fn raw(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    /// Stores `body` without quota checks; used to plant fixtures.
    pub async fn put_raw(&self, key: &str, body: impl Into<String>) {
        self.entries.write().await.insert(key.to_string(), body.into());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn ensure_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{} is offline", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl DraftBackend for InMemoryDraftBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, key: &str, body: &str) -> Result<(), StorageError> {
        self.ensure_online()?;
        let mut entries = self.entries.write().await;

        if let Some(limit) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, value)| existing.len() + value.len())
                .sum();
            let needed = others + key.len() + body.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }

        entries.insert(key.to_string(), body.to_string());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_online()?;
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Io(format!("{} read failed", self.name)));
        }
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_online()?;
        if self.failing_removes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{} refused the delete", self.name)));
        }
        self.entries.write().await.remove(key);
        Ok(())
    }
}
