//! Block-height time source
//!
//! Deadlines are evaluated against a [`Clock`]. The clock only advances
//! between batches of operations, never while one is executing, so every
//! engine call samples it exactly once.

use crate::types::BlockHeight;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic block-height source
pub trait Clock: Send + Sync {
    /// Current height
    fn current_height(&self) -> BlockHeight;
}

/// Clock advanced explicitly by its owner (block producer, tests)
#[derive(Debug, Default)]
pub struct ManualClock {
    height: AtomicU64,
}

impl ManualClock {
    /// Create clock at `height`
    pub fn new(height: BlockHeight) -> Self {
        Self {
            height: AtomicU64::new(height),
        }
    }

    /// Advance by `blocks`, returning the new height
    pub fn advance(&self, blocks: u64) -> BlockHeight {
        self.height.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Advance to `height` if it is ahead; the clock never moves backwards
    pub fn advance_to(&self, height: BlockHeight) -> BlockHeight {
        self.height.fetch_max(height, Ordering::SeqCst).max(height)
    }
}

impl Clock for ManualClock {
    fn current_height(&self) -> BlockHeight {
        self.height.load(Ordering::SeqCst)
    }
}
