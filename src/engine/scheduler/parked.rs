//! Parked task tracking
//!
//! Tasks that cannot advance right now (externally suspended, or a fire
//! attempt that lost the contention guard) are parked with a due time and
//! released back into the run queue once it passes.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::engine::task::Runnable;

struct ParkedEntry {
    due: Instant,
    seq: usize,
    task: Arc<dyn Runnable>,
}

impl PartialEq for ParkedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ParkedEntry {}

impl PartialOrd for ParkedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParkedEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap; invert so the earliest due time wins.
        // The sequence number keeps same-instant entries in park order.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Mutex-guarded delay heap of tasks awaiting a timed re-check.
pub(crate) struct ParkedTasks {
    heap: Mutex<BinaryHeap<ParkedEntry>>,
    seq: AtomicUsize,
}

impl ParkedTasks {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            seq: AtomicUsize::new(0),
        }
    }

    /// Park a task until `due`.
    pub fn park(&self, task: Arc<dyn Runnable>, due: Instant) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.heap.lock().push(ParkedEntry { due, seq, task });
    }

    /// Remove and return every task whose due time has passed.
    pub fn take_due(&self, now: Instant) -> Vec<Arc<dyn Runnable>> {
        let mut heap = self.heap.lock();
        let mut due = Vec::new();
        while heap.peek().is_some_and(|entry| entry.due <= now) {
            if let Some(entry) = heap.pop() {
                due.push(entry.task);
            }
        }
        due
    }

    /// Number of parked tasks.
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }
}

impl Default for ParkedTasks {
    fn default() -> Self {
        Self::new()
    }
}
