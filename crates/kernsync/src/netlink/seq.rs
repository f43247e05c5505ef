//! Request sequence numbers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared, monotonically increasing 32-bit sequence counter.
///
/// Cloning yields a handle to the same counter, so several transports can
/// draw from one sequence space. Increments are atomic with `Relaxed`
/// ordering: numbers are unique, but carry no happens-before relation.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    next: Arc<AtomicU32>,
}

impl SequenceCounter {
    /// Seed from the wall clock, keeping bits that change between restarts
    /// while leaving room before the counter wraps.
    pub fn from_clock() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::starting_at(Self::seed(secs))
    }

    /// Counter whose first `next()` returns `value + 1`.
    pub fn starting_at(value: u32) -> Self {
        Self {
            next: Arc::new(AtomicU32::new(value)),
        }
    }

    fn seed(secs: u64) -> u32 {
        (secs as u32) & 0x00FF_00FF
    }

    /// Take the next sequence number. Wraps at `u32::MAX`.
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Last number handed out.
    pub fn current(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::from_clock()
    }
}
