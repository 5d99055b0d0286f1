//! Runtime configuration.

use std::time::Duration;

use kasami_core::{ProcessError, SystemConfig};

/// Configuration of a system of node tasks
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Process count, initial holder and per-process settings
    pub system: SystemConfig,
    /// How often each task checks its liveness timeout
    pub tick_interval: Duration,
}

impl NodeConfig {
    /// `process_count` processes with default settings
    #[must_use]
    pub fn new(process_count: usize) -> Self {
        Self::from(SystemConfig::new(process_count))
    }

    /// Check liveness every `interval`.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Validate the system configuration and the tick interval.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InvalidConfig`] if the system configuration
    /// is invalid or the tick interval is zero.
    pub fn validate(&self) -> Result<(), ProcessError> {
        self.system.validate()?;
        if self.tick_interval.is_zero() {
            return Err(ProcessError::InvalidConfig("tick interval must be non-zero".into()));
        }
        Ok(())
    }
}

impl From<SystemConfig> for NodeConfig {
    fn from(system: SystemConfig) -> Self {
        Self { system, tick_interval: Duration::from_millis(100) }
    }
}
