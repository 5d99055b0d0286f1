//! Runtime errors.

use std::time::Duration;

use kasami_core::{BusError, ProcessError, ProcessId};
use thiserror::Error;

/// Errors surfaced by node tasks and process handles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The state machine rejected an operation
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A message could not be delivered
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The requested dwell cannot be added to the clock
    #[error("{process} cannot dwell for {dwell:?}")]
    DwellTooLong {
        /// Process the request was sent to
        process: ProcessId,
        /// Dwell that was asked for
        dwell: Duration,
    },

    /// The task driving the process has stopped
    #[error("{process} has stopped")]
    Stopped {
        /// Process whose task is gone
        process: ProcessId,
    },

    /// The task driving the process panicked
    #[error("{process} panicked: {message}")]
    Panicked {
        /// Process whose task panicked
        process: ProcessId,
        /// Panic description from the runtime
        message: String,
    },
}
