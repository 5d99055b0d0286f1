//! Spawning and controlling a system of node tasks.

use std::{sync::Arc, time::Duration};

use kasami_core::{
    CriticalSectionObserver, Process, ProcessId, ProcessState, create_system, env::Environment,
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    bus::ChannelBus,
    config::NodeConfig,
    env::SystemEnv,
    error::NodeError,
    node::{Command, Node},
};

/// Snapshot of a process, published after every event it handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStatus {
    /// State machine state
    pub state: ProcessState,
    /// Whether the process currently holds the token
    pub holds_token: bool,
    /// `RN[self]`: number of requests this process has made
    pub request_seq: u64,
}

impl ProcessStatus {
    pub(crate) fn of(process: &Process) -> Self {
        Self {
            state: process.state(),
            holds_token: process.holds_token(),
            request_seq: process.request_vector().get(process.id()),
        }
    }
}

/// Driver-side handle to one process
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    id: ProcessId,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ProcessStatus>,
}

impl ProcessHandle {
    pub(crate) fn new(
        id: ProcessId,
        commands: mpsc::UnboundedSender<Command>,
        status: watch::Receiver<ProcessStatus>,
    ) -> Self {
        Self { id, commands, status }
    }

    /// Process this handle controls
    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Request the critical section and hold it for `dwell`.
    ///
    /// Resolves once the process has left its critical section, with the
    /// sequence number of the served request.
    ///
    /// # Errors
    ///
    /// - [`NodeError::Process`] if the process already has an outstanding
    ///   request
    /// - [`NodeError::DwellTooLong`] if `dwell` overflows the clock
    /// - [`NodeError::Stopped`] if the node task is gone
    pub async fn request_critical_section(&self, dwell: Duration) -> Result<u64, NodeError> {
        let (done, result) = oneshot::channel();
        self.commands
            .send(Command::Request { dwell, done })
            .map_err(|_| NodeError::Stopped { process: self.id })?;

        result.await.map_err(|_| NodeError::Stopped { process: self.id })?
    }

    /// Latest published status
    #[must_use]
    pub fn status(&self) -> ProcessStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProcessStatus> {
        self.status.clone()
    }
}

/// A running system: one task per process connected by a [`ChannelBus`]
#[derive(Debug)]
pub struct System {
    handles: Vec<ProcessHandle>,
    tasks: Vec<JoinHandle<Result<(), NodeError>>>,
}

impl System {
    /// Spawn every process of `config` on the current Tokio runtime using
    /// the system clock and OS entropy.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Process`] if the configuration is invalid.
    pub fn spawn(
        config: NodeConfig,
        observer: Arc<dyn CriticalSectionObserver>,
    ) -> Result<Self, NodeError> {
        Self::spawn_with_env(config, SystemEnv::new(), observer)
    }

    /// Spawn with a caller-supplied environment.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Process`] if the configuration is invalid.
    pub fn spawn_with_env<E: Environment>(
        config: NodeConfig,
        env: E,
        observer: Arc<dyn CriticalSectionObserver>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let processes = create_system(&config.system)?;
        let (bus, inboxes) = ChannelBus::new(processes.len());
        let bus = Arc::new(bus);

        let mut handles = Vec::with_capacity(processes.len());
        let mut tasks = Vec::with_capacity(processes.len());

        for (process, inbox) in processes.into_iter().zip(inboxes) {
            let (node, handle) = Node::new(
                process,
                Arc::clone(&bus),
                env.clone(),
                Arc::clone(&observer),
                inbox,
                config.tick_interval,
            );

            tasks.push(tokio::spawn(node.run()));
            handles.push(handle);
        }

        tracing::info!(
            processes = handles.len(),
            initial_holder = %config.system.initial_holder,
            "System started"
        );

        Ok(Self { handles, tasks })
    }

    /// Number of processes
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.handles.len()
    }

    /// Handle to process `id`, if it exists
    #[must_use]
    pub fn handle(&self, id: ProcessId) -> Option<ProcessHandle> {
        self.handles.get(id.index()).cloned()
    }

    /// Handles to every process, indexed by id
    #[must_use]
    pub fn handles(&self) -> &[ProcessHandle] {
        &self.handles
    }

    /// Status receiver of process `id`, if it exists
    #[must_use]
    pub fn status(&self, id: ProcessId) -> Option<watch::Receiver<ProcessStatus>> {
        self.handles.get(id.index()).map(ProcessHandle::subscribe)
    }

    /// Stop every task and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns the first error any task ended with.
    pub async fn shutdown(self) -> Result<(), NodeError> {
        for handle in &self.handles {
            // A task that already stopped reports through its join handle
            let _ = handle.commands.send(Command::Shutdown);
        }

        let mut first_error = None;
        for (handle, task) in self.handles.iter().zip(self.tasks) {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(NodeError::Panicked { process: handle.id, message: e.to_string() }),
            };

            if let Err(e) = result {
                tracing::error!(process = %handle.id, error = %e, "Node ended with error");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("System stopped");
        first_error.map_or(Ok(()), Err)
    }
}
