use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// One mutual-exclusion domain per proposal id.
///
/// Hold the returned mutex for the whole read-check-write of an operation.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_id(&self, id: u64) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_id_shares_a_lock() {
        let table = LockTable::new();
        let a = table.for_id(1);
        let b = table.for_id(1);
        assert!(Arc::ptr_eq(&a, &b));

        let _guard = a.lock();
        assert!(b.try_lock().is_none());
        assert!(table.for_id(2).try_lock().is_some());
    }
}
