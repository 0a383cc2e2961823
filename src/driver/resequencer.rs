//! In-order release of concurrently produced chunk results.
//!
//! Chunks are numbered at dispatch; inference finishes in arbitrary order.
//! The resequencer holds completed results until every earlier sequence
//! number is resolved, where "resolved" is either a deliverable result or a
//! skip marker for a rejected or failed chunk. Skips never stall delivery.

use std::collections::BTreeMap;

#[derive(Debug)]
pub struct Resequencer<T> {
    pending: BTreeMap<u64, Option<T>>,
    next: u64,
}

impl<T> Resequencer<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    /// Next sequence number expected for release.
    pub fn next_seq(&self) -> u64 {
        self.next
    }

    /// Records a deliverable result for `seq`.
    pub fn push(&mut self, seq: u64, value: T) {
        if seq >= self.next {
            self.pending.insert(seq, Some(value));
        }
    }

    /// Marks `seq` resolved with nothing to deliver.
    pub fn skip(&mut self, seq: u64) {
        if seq >= self.next {
            self.pending.insert(seq, None);
        }
    }

    /// Releases the maximal in-order run of resolved results.
    pub fn drain_ready(&mut self) -> Vec<T> {
        let mut ready = Vec::new();
        while let Some(entry) = self.pending.remove(&self.next) {
            self.next += 1;
            if let Some(value) = entry {
                ready.push(value);
            }
        }
        ready
    }

    /// Discards all pending results and resets numbering.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next = 0;
    }
}

impl<T> Default for Resequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}
