//! The task that drives one process.
//!
//! A node owns its [`Process`] and reacts to three event sources:
//!
//! - its inbox (requests and the token from other processes)
//! - commands from its [`ProcessHandle`](crate::ProcessHandle)
//! - timers: the end of the critical-section dwell and the liveness tick
//!
//! Every [`ProcessAction`] the process returns is executed here, in order,
//! before the next event is taken.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use kasami_core::{
    CriticalSectionObserver, Envelope, MessageBus, Process, ProcessAction, ProcessError,
    ProcessId, env::Environment,
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::MissedTickBehavior,
};

use crate::{
    error::NodeError,
    system::{ProcessHandle, ProcessStatus},
};

/// Instruction from a handle to its node
#[derive(Debug)]
pub(crate) enum Command {
    /// Request the critical section, hold it for `dwell`, then report the
    /// served sequence number
    Request { dwell: Duration, done: oneshot::Sender<Result<u64, NodeError>> },
    /// Stop the task
    Shutdown,
}

/// Request currently being served
struct Pending {
    dwell: Duration,
    done: oneshot::Sender<Result<u64, NodeError>>,
}

/// Driver of one process
///
/// Generic over the bus and environment so the same loop runs on the
/// in-memory [`ChannelBus`](crate::ChannelBus) and on simulated networks.
pub struct Node<B, E> {
    process: Process,
    bus: Arc<B>,
    env: E,
    observer: Arc<dyn CriticalSectionObserver>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ProcessStatus>,
    tick_interval: Duration,
}

impl<B, E> Node<B, E>
where
    B: MessageBus,
    E: Environment,
{
    /// Wrap `process`, which receives its messages through `inbox`.
    ///
    /// Returns the node, to be run with [`Node::run`], and the handle that
    /// drives it.
    pub fn new(
        process: Process,
        bus: Arc<B>,
        env: E,
        observer: Arc<dyn CriticalSectionObserver>,
        inbox: mpsc::UnboundedReceiver<Envelope>,
        tick_interval: Duration,
    ) -> (Self, ProcessHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(ProcessStatus::of(&process));
        let handle = ProcessHandle::new(process.id(), commands_tx, status_rx);

        let node = Self { process, bus, env, observer, inbox, commands, status, tick_interval };
        (node, handle)
    }

    fn id(&self) -> ProcessId {
        self.process.id()
    }

    /// Run until shut down or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Process`] with [`ProcessError::InvalidConfig`]
    /// before touching the process if the tick interval is zero. Otherwise
    /// returns the first fatal [`NodeError`]. The token may be lost at that
    /// point, so the rest of the system cannot make progress either.
    pub async fn run(mut self) -> Result<(), NodeError> {
        if self.tick_interval.is_zero() {
            tracing::error!(process = %self.id(), "Tick interval must be non-zero");
            return Err(ProcessError::InvalidConfig("tick interval must be non-zero".into()).into());
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pending: Option<Pending> = None;
        let mut dwell_until: Option<Instant> = None;

        tracing::debug!(process = %self.id(), holds_token = self.process.holds_token(), "Node started");
        self.publish();

        loop {
            let env = self.env.clone();

            tokio::select! {
                Some(envelope) = self.inbox.recv() => {
                    match self.process.on_message(envelope) {
                        Ok(actions) => {
                            self.execute(actions, &pending, &mut dwell_until).await?;
                        },
                        Err(e) if !e.is_fatal() => {
                            tracing::warn!(process = %self.id(), error = %e, "Dropped message");
                        },
                        Err(e) => {
                            tracing::error!(process = %self.id(), error = %e, "Protocol failure");
                            fail(&mut pending, &e);
                            return Err(e.into());
                        },
                    }
                },

                command = self.commands.recv() => match command {
                    Some(Command::Request { dwell, done }) => {
                        let now = self.env.now();
                        if now.checked_add(dwell).is_none() {
                            tracing::warn!(process = %self.id(), ?dwell, "Rejected unrepresentable dwell");
                            let _ = done.send(Err(NodeError::DwellTooLong { process: self.id(), dwell }));
                        } else {
                            match self.process.request_critical_section(now) {
                                Ok(actions) => {
                                    pending = Some(Pending { dwell, done });
                                    self.execute(actions, &pending, &mut dwell_until).await?;
                                },
                                Err(e) => {
                                    let _ = done.send(Err(e.into()));
                                },
                            }
                        }
                    },
                    Some(Command::Shutdown) | None => {
                        tracing::debug!(process = %self.id(), "Node shutting down");
                        return Ok(());
                    },
                },

                () = async {
                    match dwell_until {
                        Some(deadline) => env.sleep(deadline.saturating_duration_since(env.now())).await,
                        None => std::future::pending().await,
                    }
                } => {
                    dwell_until = None;
                    let seq = self.process.outstanding_request().unwrap_or_default();
                    let actions = self.process.release_critical_section()?;
                    self.observer.on_critical_section_exited(self.id(), seq);

                    if let Some(Pending { done, .. }) = pending.take() {
                        let _ = done.send(Ok(seq));
                    }
                    self.execute(actions, &pending, &mut dwell_until).await?;
                },

                _ = ticker.tick() => {
                    let actions = self.process.tick(self.env.now());
                    self.execute(actions, &pending, &mut dwell_until).await?;
                },
            }

            self.publish();
        }
    }

    async fn execute(
        &mut self,
        actions: Vec<ProcessAction>,
        pending: &Option<Pending>,
        dwell_until: &mut Option<Instant>,
    ) -> Result<(), NodeError> {
        for action in actions {
            match action {
                ProcessAction::Broadcast(request) => {
                    if let Err(e) = self.bus.broadcast(request).await {
                        tracing::error!(process = %self.id(), seq = request.seq, error = %e, "Broadcast failed");
                        return Err(e.into());
                    }
                },
                ProcessAction::TransferToken { to, token } => {
                    tracing::debug!(process = %self.id(), to = %to, "Sending token");
                    self.bus.send(to, Envelope::token(self.id(), token)).await.map_err(|e| {
                        tracing::error!(process = %self.id(), to = %to, error = %e, "Token lost in transfer");
                        e
                    })?;
                    self.observer.on_token_transferred(self.id(), to);
                },
                ProcessAction::EnterCriticalSection => {
                    self.process.enter_critical_section()?;
                    let seq = self.process.outstanding_request().unwrap_or_default();
                    self.observer.on_critical_section_entered(self.id(), seq);

                    let dwell = pending.as_ref().map(|p| p.dwell).unwrap_or_default();
                    let now = self.env.now();
                    let deadline = now.checked_add(dwell).unwrap_or_else(|| {
                        // Clock moved past the range checked at request time
                        tracing::warn!(process = %self.id(), ?dwell, "Dwell overflows clock, releasing now");
                        now
                    });
                    *dwell_until = Some(deadline);
                },
                ProcessAction::LivenessTimeout { waited } => {
                    self.observer.on_liveness_timeout(self.id(), waited);
                },
            }
        }
        Ok(())
    }

    fn publish(&self) {
        self.status.send_replace(ProcessStatus::of(&self.process));
    }
}

fn fail(pending: &mut Option<Pending>, error: &kasami_core::ProcessError) {
    if let Some(Pending { done, .. }) = pending.take() {
        let _ = done.send(Err(error.clone().into()));
    }
}
