//! Typed access to governance state in the ledger.
//!
//! Mutations are staged in a [`StateTxn`] and reach the ledger as one
//! [`WriteBatch`] on commit. Dropping a transaction without committing
//! discards everything it staged.

use std::collections::HashMap;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use carecoop_storage::{codec, Column, Ledger, StorageError, WriteBatch};
use carecoop_types::Address;

/// Metadata keys.
pub mod meta {
    pub const NEXT_PROPOSAL_ID: &[u8] = b"next_proposal_id";
    pub const NEXT_VOTING_ID: &[u8] = b"next_voting_proposal_id";
    pub const ADMIN: &[u8] = b"admin";
}

/// Key of a vote record: voting id followed by the effective voter.
pub fn vote_key(voting_id: u64, voter: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + Address::LEN);
    key.extend_from_slice(&codec::id_key(voting_id));
    key.extend_from_slice(voter.as_bytes());
    key
}

/// Committed governance state.
#[derive(Clone)]
pub struct StateStore {
    ledger: Arc<dyn Ledger>,
}

impl StateStore {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub fn get<T: BorshDeserialize>(&self, column: Column, key: &[u8]) -> Result<Option<T>, StorageError> {
        self.ledger
            .get(column, key)?
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    pub fn contains(&self, column: Column, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.ledger.get(column, key)?.is_some())
    }

    /// Decode every entry under `prefix`, in key order.
    pub fn scan<T: BorshDeserialize>(&self, column: Column, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>, StorageError> {
        self.ledger
            .scan_prefix(column, prefix)?
            .into_iter()
            .map(|(key, bytes)| Ok((key, codec::decode(&bytes)?)))
            .collect()
    }

    pub fn begin(&self) -> StateTxn<'_> {
        StateTxn {
            store: self,
            staged: HashMap::new(),
            batch: WriteBatch::new(),
        }
    }
}

/// Staged writes with read-your-writes semantics.
pub struct StateTxn<'a> {
    store: &'a StateStore,
    staged: HashMap<(Column, Vec<u8>), Option<Vec<u8>>>,
    batch: WriteBatch,
}

impl StateTxn<'_> {
    pub fn get<T: BorshDeserialize>(&self, column: Column, key: &[u8]) -> Result<Option<T>, StorageError> {
        match self.staged.get(&(column, key.to_vec())) {
            Some(Some(bytes)) => codec::decode(bytes).map(Some),
            Some(None) => Ok(None),
            None => self.store.get(column, key),
        }
    }

    pub fn contains(&self, column: Column, key: &[u8]) -> Result<bool, StorageError> {
        match self.staged.get(&(column, key.to_vec())) {
            Some(staged) => Ok(staged.is_some()),
            None => self.store.contains(column, key),
        }
    }

    pub fn put<T: BorshSerialize>(&mut self, column: Column, key: &[u8], value: &T) -> Result<(), StorageError> {
        let bytes = codec::encode(value)?;
        self.batch.put(column, key, bytes.clone());
        self.staged.insert((column, key.to_vec()), Some(bytes));
        Ok(())
    }

    pub fn delete(&mut self, column: Column, key: &[u8]) {
        self.batch.delete(column, key);
        self.staged.insert((column, key.to_vec()), None);
    }

    pub fn commit(self) -> Result<(), StorageError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.store.ledger.commit(self.batch)
    }
}
