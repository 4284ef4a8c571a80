//! Lock-free queue handing pending work items to pool workers.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Workers call [`next()`](WorkQueue::next) to atomically claim an item.
/// Items are claimed in submission order; nothing is ever re-queued.
pub struct WorkQueue<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next item, or `None` when the queue is drained.
    pub fn next(&self) -> Option<&T> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i)
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}
