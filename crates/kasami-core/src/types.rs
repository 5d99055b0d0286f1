//! Identifier types.

use std::fmt;

/// Identifies a participant: an integer in `[0, N)`, fixed for a run.
///
/// Displayed as `P{n}`, matching how processes are named in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Wrap a raw id. Range checking against the system size happens where
    /// the size is known (see [`ProcessId::checked`]).
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Wrap a raw id, returning `None` if it is not below `process_count`.
    #[must_use]
    pub fn checked(raw: u32, process_count: usize) -> Option<Self> {
        ((raw as usize) < process_count).then_some(Self(raw))
    }

    /// Raw numeric value
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Position of this process in per-process vectors
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// All ids of a system with `process_count` processes, in order.
    pub fn all(process_count: usize) -> impl Iterator<Item = ProcessId> + Clone {
        #[allow(clippy::cast_possible_truncation)]
        (0..process_count as u32).map(ProcessId)
    }
}

impl From<u32> for ProcessId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_p_prefix() {
        assert_eq!(ProcessId::new(3).to_string(), "P3");
    }

    #[test]
    fn checked_rejects_out_of_range() {
        assert_eq!(ProcessId::checked(2, 3), Some(ProcessId::new(2)));
        assert_eq!(ProcessId::checked(3, 3), None);
        assert_eq!(ProcessId::checked(0, 0), None);
    }

    #[test]
    fn all_enumerates_in_order() {
        let ids: Vec<_> = ProcessId::all(3).map(ProcessId::as_u32).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
