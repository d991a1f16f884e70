//! # Artifact Storage
//!
//! The storage collaborator boundary.
//!
//! Artifacts are keyed by their content address, so storing the same
//! bytes twice keeps a single copy. Each store counts how many times an
//! address was put; that count doubles as the edition number of the
//! artifact.

mod redb_store;

pub use redb_store::RedbStore;

use crate::ContentAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

/// Storage collaborator failure. Reported as-is; the engine never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Confirmation of a `put`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReceipt {
    /// The textual key the artifact is stored under.
    pub key: String,
    /// False when the address was already present.
    pub newly_stored: bool,
    /// How many times the address has been put, this call included.
    pub references: u64,
}

/// Content-addressed artifact storage.
pub trait ArtifactStore {
    /// Store `bytes` under `address`, or bump the reference count if it
    /// is already present.
    fn put(&self, address: &ContentAddress, bytes: &[u8]) -> Result<StoreReceipt, StoreError>;

    /// Fetch the bytes stored under `address`.
    fn get(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>, StoreError>;

    /// Check whether `address` is stored.
    fn contains(&self, address: &ContentAddress) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredArtifact {
    bytes: Vec<u8>,
    references: u64,
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: Mutex<BTreeMap<String, StoredArtifact>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct artifacts.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.artifacts.lock().map_err(|_| StoreError::Poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&self, address: &ContentAddress, bytes: &[u8]) -> Result<StoreReceipt, StoreError> {
        let key = address.to_string();
        let mut artifacts = self.artifacts.lock().map_err(|_| StoreError::Poisoned)?;

        let (newly_stored, references) = match artifacts.get_mut(&key) {
            Some(existing) => {
                existing.references = existing.references.saturating_add(1);
                (false, existing.references)
            }
            None => {
                artifacts.insert(
                    key.clone(),
                    StoredArtifact {
                        bytes: bytes.to_vec(),
                        references: 1,
                    },
                );
                (true, 1)
            }
        };

        Ok(StoreReceipt {
            key,
            newly_stored,
            references,
        })
    }

    fn get(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>, StoreError> {
        let artifacts = self.artifacts.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(artifacts.get(&address.to_string()).map(|a| a.bytes.clone()))
    }

    fn contains(&self, address: &ContentAddress) -> Result<bool, StoreError> {
        let artifacts = self.artifacts.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(artifacts.contains_key(&address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentAddresser;

    #[test]
    fn identical_bytes_are_stored_once() {
        let store = MemoryStore::new();
        let address = ContentAddresser::default().address(b"image");

        let first = store.put(&address, b"image").expect("put");
        let second = store.put(&address, b"image").expect("put");

        assert!(first.newly_stored);
        assert!(!second.newly_stored);
        assert_eq!(second.references, 2);
        assert_eq!(first.key, address.to_string());
        assert_eq!(store.len().expect("len"), 1);
    }

    #[test]
    fn get_returns_stored_bytes() {
        let store = MemoryStore::new();
        let addresser = ContentAddresser::default();
        let stored = addresser.address(b"a");
        let missing = addresser.address(b"b");

        store.put(&stored, b"a").expect("put");
        assert_eq!(store.get(&stored).expect("get"), Some(b"a".to_vec()));
        assert_eq!(store.get(&missing).expect("get"), None);
        assert!(!store.contains(&missing).expect("contains"));
    }
}
