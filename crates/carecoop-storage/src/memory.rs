//! In-memory ledger.

use crate::batch::{BatchOp, WriteBatch};
use crate::column::Column;
use crate::error::StorageError;
use crate::{Ledger, ScanResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Ledger held entirely in memory.
///
/// Commits apply under a single write lock, so readers never observe a
/// partially applied batch.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    columns: RwLock<HashMap<Column, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a column.
    pub fn len(&self, column: Column) -> usize {
        self.columns.read().get(&column).map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.read().values().all(|c| c.is_empty())
    }
}

impl Ledger for MemoryLedger {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .columns
            .read()
            .get(&column)
            .and_then(|entries| entries.get(key).cloned()))
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StorageError> {
        let columns = self.columns.read();
        let Some(entries) = columns.get(&column) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut columns = self.columns.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { column, key, value } => {
                    columns.entry(column).or_default().insert(key, value);
                }
                BatchOp::Delete { column, key } => {
                    if let Some(entries) = columns.get_mut(&column) {
                        entries.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let ledger = MemoryLedger::new();
        let mut batch = WriteBatch::new();
        batch.put(Column::Metadata, b"key", b"value".to_vec());
        ledger.commit(batch).unwrap();

        assert_eq!(ledger.get(Column::Metadata, b"key").unwrap(), Some(b"value".to_vec()));
        assert_eq!(ledger.get(Column::Members, b"key").unwrap(), None);
    }

    #[test]
    fn test_batch_applies_in_order() {
        let ledger = MemoryLedger::new();
        let mut batch = WriteBatch::new();
        batch.put(Column::Metadata, b"key1", b"value1".to_vec());
        batch.put(Column::Metadata, b"key2", b"value2".to_vec());
        batch.delete(Column::Metadata, b"key1");
        ledger.commit(batch).unwrap();

        assert_eq!(ledger.get(Column::Metadata, b"key1").unwrap(), None);
        assert_eq!(ledger.get(Column::Metadata, b"key2").unwrap(), Some(b"value2".to_vec()));
        assert_eq!(ledger.len(Column::Metadata), 1);
    }

    #[test]
    fn test_scan_prefix() {
        let ledger = MemoryLedger::new();
        let mut batch = WriteBatch::new();
        batch.put(Column::Votes, &[0, 1, 9], vec![1]);
        batch.put(Column::Votes, &[0, 1, 3], vec![2]);
        batch.put(Column::Votes, &[0, 2, 1], vec![3]);
        ledger.commit(batch).unwrap();

        let hits = ledger.scan_prefix(Column::Votes, &[0, 1]).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, vec![0, 1, 3]);
        assert_eq!(hits[1].0, vec![0, 1, 9]);

        assert!(ledger.scan_prefix(Column::Proposals, &[]).unwrap().is_empty());
    }
}
