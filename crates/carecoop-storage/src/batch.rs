use crate::column::Column;

/// A single staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { column: Column, key: Vec<u8>, value: Vec<u8> },
    Delete { column: Column, key: Vec<u8> },
}

/// Write batch for atomic operations.
///
/// Operations are applied in insertion order when the batch is committed.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a value into the batch.
    pub fn put(&mut self, column: Column, key: &[u8], value: Vec<u8>) {
        self.ops.push(BatchOp::Put {
            column,
            key: key.to_vec(),
            value,
        });
    }

    /// Delete a value in the batch.
    pub fn delete(&mut self, column: Column, key: &[u8]) {
        self.ops.push(BatchOp::Delete {
            column,
            key: key.to_vec(),
        });
    }

    /// Get the batch size.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_preserves_order() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.put(Column::Metadata, b"k", b"v1".to_vec());
        batch.delete(Column::Metadata, b"k");
        assert_eq!(batch.len(), 2);

        let ops = batch.into_ops();
        assert!(matches!(ops[0], BatchOp::Put { .. }));
        assert!(matches!(ops[1], BatchOp::Delete { .. }));
    }
}
