use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corrupted ledger file: {0}")]
    Corrupted(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Ledger is locked by another handle: {0}")]
    Locked(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let io_error = StorageError::Io("disk full".to_string());
        assert!(io_error.to_string().contains("IO error"));

        let corrupted = StorageError::Corrupted("bad json".to_string());
        assert!(corrupted.to_string().contains("bad json"));
    }
}
