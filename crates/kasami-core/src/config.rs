//! Process and system configuration.

use std::time::Duration;

use crate::{error::ProcessError, types::ProcessId};

/// Per-process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    /// How long a request may wait for the token before a liveness timeout
    /// is reported. `None` waits forever, as the base algorithm does.
    pub liveness_timeout: Option<Duration>,
    /// Re-broadcast the outstanding request when the liveness timeout fires.
    ///
    /// The re-broadcast reuses the original sequence number, so receivers
    /// that already saw it treat it as a duplicate.
    pub resubmit_on_timeout: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self { liveness_timeout: None, resubmit_on_timeout: true }
    }
}

impl ProcessConfig {
    /// Report a liveness timeout after `timeout` of waiting.
    #[must_use]
    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = Some(timeout);
        self
    }

    /// Enable or disable resubmission on liveness timeout.
    #[must_use]
    pub fn with_resubmit_on_timeout(mut self, resubmit: bool) -> Self {
        self.resubmit_on_timeout = resubmit;
        self
    }
}

/// Configuration of a whole system of processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    /// Number of participating processes (N)
    pub process_count: usize,
    /// Process that holds the token at start
    pub initial_holder: ProcessId,
    /// Configuration applied to every process
    pub process: ProcessConfig,
}

impl SystemConfig {
    /// `process_count` processes, token starting at process 0.
    #[must_use]
    pub fn new(process_count: usize) -> Self {
        Self {
            process_count,
            initial_holder: ProcessId::new(0),
            process: ProcessConfig::default(),
        }
    }

    /// Start the token at `holder` instead of process 0.
    #[must_use]
    pub fn with_initial_holder(mut self, holder: ProcessId) -> Self {
        self.initial_holder = holder;
        self
    }

    /// Use `config` for every process.
    #[must_use]
    pub fn with_process_config(mut self, config: ProcessConfig) -> Self {
        self.process = config;
        self
    }

    /// Check that the configuration describes a runnable system.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InvalidConfig`] if there are no processes, more
    /// than `u32::MAX` of them, or the initial holder is out of range.
    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.process_count == 0 {
            return Err(ProcessError::InvalidConfig("system needs at least one process".into()));
        }

        if self.process_count > u32::MAX as usize {
            return Err(ProcessError::InvalidConfig(format!(
                "{} processes cannot be addressed with 32-bit ids",
                self.process_count
            )));
        }

        if self.initial_holder.index() >= self.process_count {
            return Err(ProcessError::InvalidConfig(format!(
                "initial holder {} outside a system of {} processes",
                self.initial_holder, self.process_count
            )));
        }

        Ok(())
    }
}
