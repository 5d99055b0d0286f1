//! Error types for the Kasami protocol core.
//!
//! Only genuine misuse surfaces as an error. Legitimate protocol races are
//! absorbed by the state machine and never reach the caller:
//!
//! - Duplicate admission of a process already in the pending queue is a
//!   no-op.
//! - Stale request messages (sequence number not above the recorded one)
//!   leave the request vector unchanged.

use thiserror::Error;

use crate::{process::ProcessState, types::ProcessId};

/// Errors that can occur during process state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// An operation that requires holding the token was invoked without it,
    /// or a token arrived at a process that already holds one
    #[error("protocol violation: {process} cannot {operation} in state {state:?}: {reason}")]
    ProtocolViolation {
        /// Process the operation was invoked on
        process: ProcessId,
        /// Operation that was attempted
        operation: &'static str,
        /// State when the violation occurred
        state: ProcessState,
        /// What was wrong
        reason: &'static str,
    },

    /// Invalid state transition attempted
    #[error("invalid state transition: {process} cannot {operation} from {state:?}")]
    InvalidState {
        /// Process the operation was invoked on
        process: ProcessId,
        /// Operation that was attempted
        operation: &'static str,
        /// Current state when error occurred
        state: ProcessState,
    },

    /// A process id outside `[0, count)` crossed a boundary
    #[error("unknown process {process}: system has {count} processes")]
    UnknownProcess {
        /// Raw id that was rejected
        process: u32,
        /// Number of processes in the system
        count: usize,
    },

    /// A received token does not fit this system
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// System or process configuration is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProcessError {
    /// Returns true if this error means the process (or the system) can no
    /// longer be trusted to uphold mutual exclusion.
    ///
    /// An unknown process id only invalidates the message that carried it;
    /// every other variant is a logic error in the driver or a lost token.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProcessError::UnknownProcess { .. })
    }
}
