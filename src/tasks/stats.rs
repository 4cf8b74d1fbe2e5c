/*!
 * Lock-Free Task Statistics
 * Atomic counters updated by workers without touching the queue lock
 */

use super::types::TaskStats;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic task statistics
#[repr(C, align(64))]
pub(super) struct AtomicTaskStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    abandoned: AtomicU64,
}

impl AtomicTaskStats {
    #[inline]
    pub const fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_abandoned(&self, count: u64) {
        self.abandoned.fetch_add(count, Ordering::Relaxed);
    }

    /// Read-only snapshot; counters may advance while it is taken
    pub fn snapshot(&self) -> TaskStats {
        TaskStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

impl Default for AtomicTaskStats {
    fn default() -> Self {
        Self::new()
    }
}
