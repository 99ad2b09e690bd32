//! File-backed ledger: one JSON document rewritten on every commit.

use crate::batch::{BatchOp, WriteBatch};
use crate::column::Column;
use crate::error::StorageError;
use crate::{Ledger, ScanResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// column name → hex key → hex value
type Document = BTreeMap<String, BTreeMap<String, String>>;

const DATA_FILE: &str = "ledger.json";
const LOCK_FILE: &str = "ledger.lock";

/// Simple JSON file-based ledger.
///
/// A commit serializes the updated document to a temporary file and renames
/// it over the previous one, so a failed write leaves the old state intact.
///
/// Each handle holds an exclusive advisory lock on `ledger.lock` from open
/// until drop. The document is loaded after the lock is taken, so no other
/// handle, in this process or another, can commit underneath it.
pub struct FileLedger {
    path: PathBuf,
    data: RwLock<Document>,
    _lock: File,
}

impl FileLedger {
    /// Open (or create) a ledger in `dir`, waiting for any other handle on
    /// the same directory to be dropped.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        let lock = Self::lock_file(dir)?;
        lock.lock_exclusive()?;
        Self::load(dir, lock)
    }

    /// Like [`FileLedger::open`] but fails with `Locked` instead of waiting.
    pub fn try_open(dir: &Path) -> Result<Self, StorageError> {
        let lock = Self::lock_file(dir)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(dir.display().to_string()));
        }
        Self::load(dir, lock)
    }

    fn lock_file(dir: &Path) -> Result<File, StorageError> {
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        Ok(file)
    }

    fn load(dir: &Path, lock: File) -> Result<Self, StorageError> {
        let data_file = dir.join(DATA_FILE);
        let data = if data_file.exists() {
            let content = fs::read_to_string(&data_file)?;
            let doc: Document = serde_json::from_str(&content)
                .map_err(|e| StorageError::Corrupted(format!("{}: {}", data_file.display(), e)))?;
            for column in doc.keys() {
                if Column::from_name(column).is_none() {
                    return Err(StorageError::Corrupted(format!("unknown column '{}'", column)));
                }
            }
            tracing::info!(path = %data_file.display(), columns = doc.len(), "Loaded ledger from disk");
            doc
        } else {
            Document::new()
        };

        tracing::debug!(path = %dir.display(), "Acquired ledger lock");
        Ok(Self {
            path: dir.to_path_buf(),
            data: RwLock::new(data),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, doc: &Document) -> Result<(), StorageError> {
        let data_file = self.path.join(DATA_FILE);
        let tmp_file = self.path.join(format!("{}.tmp", DATA_FILE));
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&tmp_file, content)?;
        fs::rename(&tmp_file, &data_file)?;
        Ok(())
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, StorageError> {
    hex::decode(s).map_err(|e| StorageError::Corrupted(e.to_string()))
}

impl Ledger for FileLedger {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read();
        match data.get(column.name()).and_then(|c| c.get(&hex::encode(key))) {
            Some(value) => Ok(Some(decode_hex(value)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StorageError> {
        let data = self.data.read();
        let Some(entries) = data.get(column.name()) else {
            return Ok(Vec::new());
        };
        // Lowercase hex preserves byte ordering, so the string range is the key range.
        let hex_prefix = hex::encode(prefix);
        entries
            .range(hex_prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&hex_prefix))
            .map(|(k, v)| Ok((decode_hex(k)?, decode_hex(v)?)))
            .collect()
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut data = self.data.write();
        let mut next = data.clone();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { column, key, value } => {
                    next.entry(column.name().to_string())
                        .or_default()
                        .insert(hex::encode(key), hex::encode(value));
                }
                BatchOp::Delete { column, key } => {
                    if let Some(entries) = next.get_mut(column.name()) {
                        entries.remove(&hex::encode(key));
                    }
                }
            }
        }
        self.persist(&next)?;
        *data = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn put(ledger: &FileLedger, column: Column, key: &[u8], value: &[u8]) {
        let mut batch = WriteBatch::new();
        batch.put(column, key, value.to_vec());
        ledger.commit(batch).unwrap();
    }

    #[test]
    fn test_ledger_creation() {
        let temp_dir = TempDir::new().unwrap();
        let _ledger = FileLedger::open(temp_dir.path()).unwrap();
        assert!(temp_dir.path().exists());
        // ledger.json is only created on first commit
        assert!(!temp_dir.path().join(DATA_FILE).exists());
        assert!(temp_dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = FileLedger::open(temp_dir.path()).unwrap();

        put(&ledger, Column::Metadata, b"test_key", b"test_value");
        assert_eq!(
            ledger.get(Column::Metadata, b"test_key").unwrap(),
            Some(b"test_value".to_vec())
        );
        assert_eq!(ledger.get(Column::Metadata, b"missing").unwrap(), None);
    }

    #[test]
    fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        {
            let ledger = FileLedger::open(temp_dir.path()).unwrap();
            put(&ledger, Column::Proposals, &[0, 0, 0, 1], b"proposal");
        }
        {
            let ledger = FileLedger::open(temp_dir.path()).unwrap();
            assert_eq!(
                ledger.get(Column::Proposals, &[0, 0, 0, 1]).unwrap(),
                Some(b"proposal".to_vec())
            );
        }
    }

    #[test]
    fn test_delete_and_columns_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = FileLedger::open(temp_dir.path()).unwrap();

        put(&ledger, Column::Members, b"k", b"member");
        put(&ledger, Column::Votes, b"k", b"vote");

        let mut batch = WriteBatch::new();
        batch.delete(Column::Members, b"k");
        ledger.commit(batch).unwrap();

        assert_eq!(ledger.get(Column::Members, b"k").unwrap(), None);
        assert_eq!(ledger.get(Column::Votes, b"k").unwrap(), Some(b"vote".to_vec()));
    }

    #[test]
    fn test_scan_prefix_in_key_order() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = FileLedger::open(temp_dir.path()).unwrap();

        put(&ledger, Column::Votes, &[0, 1, 0xaa], b"b");
        put(&ledger, Column::Votes, &[0, 1, 0x0f], b"a");
        put(&ledger, Column::Votes, &[0, 2, 0x00], b"c");

        let hits = ledger.scan_prefix(Column::Votes, &[0, 1]).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].1, b"a".to_vec());
        assert_eq!(hits[1].1, b"b".to_vec());
    }

    #[test]
    fn test_second_handle_is_locked_out() {
        let temp_dir = TempDir::new().unwrap();
        let first = FileLedger::open(temp_dir.path()).unwrap();

        assert!(matches!(
            FileLedger::try_open(temp_dir.path()),
            Err(StorageError::Locked(_))
        ));

        drop(first);
        assert!(FileLedger::try_open(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_concurrent_handles_keep_every_commit() {
        let temp_dir = TempDir::new().unwrap();
        let first = FileLedger::open(temp_dir.path()).unwrap();

        std::thread::scope(|s| {
            let waiter = s.spawn(|| {
                // Blocks until `first` is dropped, then sees its commit
                let second = FileLedger::open(temp_dir.path()).unwrap();
                put(&second, Column::Votes, b"bob", b"against");
                second.get(Column::Votes, b"alice").unwrap()
            });

            put(&first, Column::Votes, b"alice", b"for");
            drop(first);

            assert_eq!(waiter.join().unwrap(), Some(b"for".to_vec()));
        });

        let reopened = FileLedger::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.get(Column::Votes, b"alice").unwrap(), Some(b"for".to_vec()));
        assert_eq!(reopened.get(Column::Votes, b"bob").unwrap(), Some(b"against".to_vec()));
    }

    #[test]
    fn test_corrupted_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(DATA_FILE), "{ not json").unwrap();

        let result = FileLedger::open(temp_dir.path());
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }
}
