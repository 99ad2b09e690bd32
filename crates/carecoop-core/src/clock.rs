use carecoop_types::BlockHeight;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current block height.
pub trait Clock: Send + Sync {
    fn current_height(&self) -> BlockHeight;
}

/// Clock advanced explicitly by its owner (tests, CLI).
#[derive(Debug, Default)]
pub struct ManualClock {
    height: AtomicU64,
}

impl ManualClock {
    pub fn new(height: BlockHeight) -> Self {
        Self {
            height: AtomicU64::new(height),
        }
    }

    /// Move forward by `blocks`. Returns the new height.
    pub fn advance(&self, blocks: u64) -> BlockHeight {
        self.height.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Jump to `height`. Heights never move backwards.
    pub fn set(&self, height: BlockHeight) {
        self.height.fetch_max(height, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn current_height(&self) -> BlockHeight {
        self.height.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.advance(5), 15);
        assert_eq!(clock.current_height(), 15);
    }

    #[test]
    fn test_set_is_monotonic() {
        let clock = ManualClock::new(100);
        clock.set(50);
        assert_eq!(clock.current_height(), 100);
        clock.set(150);
        assert_eq!(clock.current_height(), 150);
    }
}
