//! CareCoop Storage - the ledger seam.
//!
//! The governance engine never talks to a storage engine directly. It reads
//! and writes through [`Ledger`], which is expected to provide atomic,
//! durable key-value storage organised in [`Column`]s. Two implementations
//! ship with the crate:
//! - [`MemoryLedger`] for tests and embedding
//! - [`FileLedger`], a JSON file persisted on every commit

pub mod batch;
pub mod codec;
pub mod column;
pub mod error;
pub mod file;
pub mod memory;

pub use batch::{BatchOp, WriteBatch};
pub use column::Column;
pub use error::StorageError;
pub use file::FileLedger;
pub use memory::MemoryLedger;

/// Key/value pairs returned by a prefix scan, ordered by key.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Atomic, durable key-value storage.
pub trait Ledger: Send + Sync {
    /// Get a value.
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// All entries in `column` whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StorageError>;

    /// Apply every operation in `batch`, or none of them.
    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;
}

impl<L: Ledger + ?Sized> Ledger for std::sync::Arc<L> {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(column, key)
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StorageError> {
        (**self).scan_prefix(column, prefix)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        (**self).commit(batch)
    }
}
