//! Relaxed progress counter shared by the worker threads.

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-worker counter.  Starts at zero, counts up.
///
/// This is **only** for user feedback in the middle of a long multi-core
/// computation.  Each worker owns one cache line; reads sum them all.
///
/// Accesses are all done with [`Relaxed`](Ordering::Relaxed) ordering, so
/// the only guarantee is that once incrementing stops, [`get`](Counter::get)
/// eventually returns the final count.
pub struct Counter(Vec<CachePadded<AtomicU64>>);

impl Counter {
    pub fn zero(workers: usize) -> Counter {
        let mut vec = Vec::new();
        vec.resize_with(workers, || CachePadded::new(AtomicU64::new(0)));
        Counter(vec)
    }

    pub fn get(&self) -> u64 {
        self.0
            .iter()
            .map(|atomic| atomic.load(Ordering::Relaxed))
            .sum()
    }

    pub fn increment(&self, worker: usize) {
        self.0[worker].fetch_add(1, Ordering::Relaxed);
    }
}
