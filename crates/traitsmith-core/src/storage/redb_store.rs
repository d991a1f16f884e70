//! # redb-backed Artifact Store
//!
//! A disk-backed artifact store using the redb embedded database.
//!
//! - ACID transactions: bytes and reference count change together
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)

use super::{ArtifactStore, StoreError, StoreReceipt};
use crate::ContentAddress;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for artifact bytes: address text -> bytes
const ARTIFACTS: TableDefinition<&str, &[u8]> = TableDefinition::new("artifacts");

/// Table for reference counts: address text -> puts so far
const REFS: TableDefinition<&str, u64> = TableDefinition::new("refs");

fn io(e: impl std::fmt::Display) -> StoreError {
    StoreError::Io(e.to_string())
}

/// A content-addressed store persisted to a redb file.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(ARTIFACTS).map_err(io)?;
            let _ = write_txn.open_table(REFS).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "Artifact store opened");
        Ok(Self { db })
    }

    /// Reference count of `address` (0 when absent).
    pub fn references(&self, address: &ContentAddress) -> Result<u64, StoreError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(REFS).map_err(io)?;
        Ok(table
            .get(address.to_string().as_str())
            .map_err(io)?
            .map(|v| v.value())
            .unwrap_or(0))
    }
}

impl ArtifactStore for RedbStore {
    fn put(&self, address: &ContentAddress, bytes: &[u8]) -> Result<StoreReceipt, StoreError> {
        let key = address.to_string();
        let write_txn = self.db.begin_write().map_err(io)?;

        let references = {
            let mut refs = write_txn.open_table(REFS).map_err(io)?;
            let previous = refs
                .get(key.as_str())
                .map_err(io)?
                .map(|v| v.value())
                .unwrap_or(0);
            let references = previous.saturating_add(1);
            refs.insert(key.as_str(), references).map_err(io)?;

            if previous == 0 {
                let mut artifacts = write_txn.open_table(ARTIFACTS).map_err(io)?;
                artifacts.insert(key.as_str(), bytes).map_err(io)?;
            }
            references
        };

        write_txn.commit().map_err(io)?;

        Ok(StoreReceipt {
            key,
            newly_stored: references == 1,
            references,
        })
    }

    fn get(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(ARTIFACTS).map_err(io)?;
        Ok(table
            .get(address.to_string().as_str())
            .map_err(io)?
            .map(|v| v.value().to_vec()))
    }

    fn contains(&self, address: &ContentAddress) -> Result<bool, StoreError> {
        Ok(self.references(address)? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentAddresser;
    use tempfile::tempdir;

    #[test]
    fn put_then_get() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("artifacts.redb")).expect("open db");
        let address = ContentAddresser::default().address(b"bytes");

        let receipt = store.put(&address, b"bytes").expect("put");
        assert!(receipt.newly_stored);
        assert_eq!(receipt.references, 1);
        assert_eq!(store.get(&address).expect("get"), Some(b"bytes".to_vec()));
        assert!(store.contains(&address).expect("contains"));
    }

    #[test]
    fn duplicate_put_bumps_references() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("artifacts.redb")).expect("open db");
        let address = ContentAddresser::default().address(b"dup");

        store.put(&address, b"dup").expect("put");
        let again = store.put(&address, b"dup").expect("put");
        assert!(!again.newly_stored);
        assert_eq!(again.references, 2);
    }

    #[test]
    fn references_survive_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("artifacts.redb");
        let address = ContentAddresser::default().address(b"kept");

        {
            let store = RedbStore::open(&db_path).expect("open db");
            store.put(&address, b"kept").expect("put");
            store.put(&address, b"kept").expect("put");
        }

        {
            let store = RedbStore::open(&db_path).expect("reopen db");
            assert_eq!(store.references(&address).expect("refs"), 2);
            assert_eq!(store.get(&address).expect("get"), Some(b"kept".to_vec()));
            let third = store.put(&address, b"kept").expect("put");
            assert_eq!(third.references, 3);
        }
    }
}
