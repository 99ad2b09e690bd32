//! Value encoding for ledger records (borsh).

use crate::error::StorageError;
use borsh::{BorshDeserialize, BorshSerialize};

pub fn encode<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    borsh::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub fn decode<T: BorshDeserialize>(bytes: &[u8]) -> Result<T, StorageError> {
    borsh::from_slice(bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
}

/// Big-endian id key, so prefix scans enumerate in id order.
pub fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<String, _> = decode(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(StorageError::Deserialization(_))));
    }

    #[test]
    fn test_id_keys_sort_numerically() {
        assert!(id_key(2) < id_key(10));
        assert!(id_key(255) < id_key(256));
    }
}
