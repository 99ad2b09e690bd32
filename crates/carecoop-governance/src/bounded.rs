//! Insertion-ordered set with a fixed capacity.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::Serialize;

use crate::error::GovernanceError;

/// Ordered set of unique items.
///
/// The capacity is supplied on insert rather than stored, so records written
/// under one configuration stay readable under another. Exceeding the
/// capacity is an error, never a silent drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize, BorshDeserialize)]
#[serde(transparent)]
pub struct BoundedSet<T> {
    items: Vec<T>,
}

impl<T> Default for BoundedSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: PartialEq> BoundedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an iterator, rejecting duplicates and overflow.
    pub fn try_from_iter<I>(iter: I, cap: usize, what: &'static str) -> Result<Self, GovernanceError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut set = Self::new();
        for item in iter {
            if !set.try_insert(item, cap, what)? {
                return Err(GovernanceError::InvalidParameter(format!("duplicate entry in {}", what)));
            }
        }
        Ok(set)
    }

    /// Append `item`. Returns `Ok(false)` if it was already present.
    pub fn try_insert(&mut self, item: T, cap: usize, what: &'static str) -> Result<bool, GovernanceError> {
        if self.items.contains(&item) {
            return Ok(false);
        }
        if self.items.len() >= cap {
            return Err(GovernanceError::CapacityExceeded { what, cap });
        }
        self.items.push(item);
        Ok(true)
    }

    /// Remove `item`, keeping the order of the rest. Returns whether it was present.
    pub fn remove(&mut self, item: &T) -> bool {
        match self.items.iter().position(|i| i == item) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a BoundedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order_and_rejects_duplicates() {
        let mut set = BoundedSet::new();
        assert!(set.try_insert(3, 5, "test").unwrap());
        assert!(set.try_insert(1, 5, "test").unwrap());
        assert!(!set.try_insert(3, 5, "test").unwrap());
        assert_eq!(set.as_slice(), &[3, 1]);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut set = BoundedSet::new();
        set.try_insert(1, 2, "roles").unwrap();
        set.try_insert(2, 2, "roles").unwrap();
        assert_eq!(
            set.try_insert(3, 2, "roles"),
            Err(GovernanceError::CapacityExceeded { what: "roles", cap: 2 })
        );
        // A duplicate at capacity is still reported as a duplicate
        assert_eq!(set.try_insert(2, 2, "roles"), Ok(false));
    }

    #[test]
    fn test_remove() {
        let mut set = BoundedSet::try_from_iter([1, 2, 3], 5, "test").unwrap();
        assert!(set.remove(&2));
        assert!(!set.remove(&2));
        assert_eq!(set.as_slice(), &[1, 3]);
    }

    #[test]
    fn test_try_from_iter_rejects_duplicates_and_overflow() {
        assert!(BoundedSet::try_from_iter([1, 1], 5, "test").is_err());
        assert!(matches!(
            BoundedSet::try_from_iter([1, 2, 3], 2, "test"),
            Err(GovernanceError::CapacityExceeded { .. })
        ));
    }
}
