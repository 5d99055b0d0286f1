//! Driver hooks for critical-section events.
//!
//! The engine itself reports nothing. Drivers call these hooks as they
//! execute [`ProcessAction`](crate::process::ProcessAction)s, so telemetry,
//! logging and test oracles can watch a run without touching protocol state.

use std::time::Duration;

use crate::types::ProcessId;

/// Observer of critical-section activity. All methods default to no-ops.
///
/// Hooks are called from the task driving the process and must not block.
pub trait CriticalSectionObserver: Send + Sync + 'static {
    /// `process` entered its critical section for request `seq`
    fn on_critical_section_entered(&self, process: ProcessId, seq: u64) {
        let _ = (process, seq);
    }

    /// `process` left its critical section
    fn on_critical_section_exited(&self, process: ProcessId, seq: u64) {
        let _ = (process, seq);
    }

    /// The token moved from `from` to `to`
    fn on_token_transferred(&self, from: ProcessId, to: ProcessId) {
        let _ = (from, to);
    }

    /// `process` has waited `waited` for the token
    fn on_liveness_timeout(&self, process: ProcessId, waited: Duration) {
        let _ = (process, waited);
    }
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CriticalSectionObserver for NoopObserver {}
