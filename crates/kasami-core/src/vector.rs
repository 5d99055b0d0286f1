//! Per-process request vector (`RN`).

use crate::types::ProcessId;

/// `RN[j]` is the highest request sequence number this process has observed
/// from process `j`, including its own.
///
/// # Invariants
///
/// - Every entry is monotonically non-decreasing: [`RequestVector::observe`]
///   only ever raises an entry, and [`RequestVector::increment`] adds one.
///
/// # Panics
///
/// Methods index by [`ProcessId::index`] and panic on ids outside the
/// vector. The process state machine validates ids before calling in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestVector {
    counts: Vec<u64>,
}

impl RequestVector {
    /// All-zero vector for `process_count` processes
    #[must_use]
    pub fn new(process_count: usize) -> Self {
        Self { counts: vec![0; process_count] }
    }

    /// Number of processes covered
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True for a vector covering no processes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `RN[id]`
    #[must_use]
    pub fn get(&self, id: ProcessId) -> u64 {
        self.counts[id.index()]
    }

    /// Bump `RN[id]` for a new own request and return the new value.
    pub fn increment(&mut self, id: ProcessId) -> u64 {
        let entry = &mut self.counts[id.index()];
        *entry += 1;
        *entry
    }

    /// `RN[id] = max(RN[id], seq)`. Returns whether the entry advanced.
    ///
    /// Stale or duplicate observations leave the vector unchanged.
    pub fn observe(&mut self, id: ProcessId, seq: u64) -> bool {
        let entry = &mut self.counts[id.index()];
        if seq > *entry {
            *entry = seq;
            true
        } else {
            false
        }
    }

    /// Raw entries, indexed by process id
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.counts
    }
}
