//! Per-process Suzuki–Kasami state machine.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept time as a parameter where they need it
//! - Methods return `Result<Vec<ProcessAction>, ProcessError>`
//! - The driver executes the actions (broadcast, move the token, run the
//!   critical section)
//!
//! The machine never touches a transport, a clock or a lock. Mutual
//! exclusion follows from token possession alone: a process enters its
//! critical section only while it owns the [`Token`], and the token is a
//! moved value that cannot be duplicated.
//!
//! # State Machine
//!
//! ```text
//!            request            token arrives         enter
//! ┌──────┐ ───────────> ┌─────────────────┐ ──────> ┌───────────────────┐
//! │ Idle │              │ WaitingForToken │         │ InCriticalSection │
//! └──────┘ <─────────── └─────────────────┘         └───────────────────┘
//!     ^                                                       │
//!     └──────────────────────── release ──────────────────────┘
//! ```
//!
//! `Requesting` is occupied only while a request is being produced. A holder
//! that requests again skips the broadcast and is told to enter immediately.
//!
//! # Dispatch
//!
//! Whenever the holder has no use for the token (after release, or while
//! idle when a request or the token arrives) it dispatches:
//!
//! 1. `LN[self] = RN[self]`
//! 2. every `j` with `RN[j] == LN[j] + 1` that is not queued is enqueued
//! 3. if the queue is non-empty, the head receives the token

use std::time::{Duration, Instant};

use crate::{
    config::ProcessConfig,
    error::ProcessError,
    message::{Envelope, Message, RequestMessage},
    token::Token,
    types::ProcessId,
    vector::RequestVector,
};

/// Actions returned by the process state machine.
///
/// The driver (test harness or node runtime) executes these in order.
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessAction {
    /// Send this request to every other process
    Broadcast(RequestMessage),

    /// Hand the token to `to`. The process no longer holds it.
    TransferToken {
        /// New holder
        to: ProcessId,
        /// The token itself
        token: Token,
    },

    /// The process holds the token for its outstanding request. The driver
    /// should call [`Process::enter_critical_section`].
    EnterCriticalSection,

    /// The outstanding request has waited past the configured liveness
    /// timeout.
    LivenessTimeout {
        /// Time since the request (or the previous timeout)
        waited: Duration,
    },
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No outstanding request
    Idle,
    /// Request being produced
    Requesting,
    /// Request broadcast, token not yet used
    WaitingForToken,
    /// Executing the critical section
    InCriticalSection,
}

/// Suzuki–Kasami process
///
/// Owns its [`RequestVector`] and, while it is the holder, the [`Token`].
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    config: ProcessConfig,
    state: ProcessState,
    request_vector: RequestVector,
    token: Option<Token>,
    /// When the current wait for the token started (or last timed out)
    waiting_since: Option<Instant>,
}

impl Process {
    /// Create process `id` of a system of `process_count` processes.
    ///
    /// Exactly one process of a system is created with `Some(token)`.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::UnknownProcess`] if `id` is outside the system
    /// - [`ProcessError::MalformedToken`] if `token` covers a different
    ///   number of processes
    pub fn new(
        id: ProcessId,
        process_count: usize,
        config: ProcessConfig,
        token: Option<Token>,
    ) -> Result<Self, ProcessError> {
        if id.index() >= process_count {
            return Err(ProcessError::UnknownProcess { process: id.as_u32(), count: process_count });
        }

        if let Some(token) = &token {
            check_dimension(token, process_count)?;
        }

        Ok(Self {
            id,
            config,
            state: ProcessState::Idle,
            request_vector: RequestVector::new(process_count),
            token,
            waiting_since: None,
        })
    }

    /// Process id
    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Number of processes in the system
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.request_vector.len()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether this process is the current token holder
    #[must_use]
    pub fn holds_token(&self) -> bool {
        self.token.is_some()
    }

    /// The token, if held
    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// This process's view of everyone's request counters
    #[must_use]
    pub fn request_vector(&self) -> &RequestVector {
        &self.request_vector
    }

    /// Sequence number of the request being served, if any
    #[must_use]
    pub fn outstanding_request(&self) -> Option<u64> {
        match self.state {
            ProcessState::Idle => None,
            _ => Some(self.request_vector.get(self.id)),
        }
    }

    /// Ask for the critical section.
    ///
    /// Increments `RN[self]`. A process that already holds the token gets
    /// [`ProcessAction::EnterCriticalSection`] without broadcasting; any
    /// other process gets a [`ProcessAction::Broadcast`] and waits.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InvalidState`] unless the process is idle.
    pub fn request_critical_section(
        &mut self,
        now: Instant,
    ) -> Result<Vec<ProcessAction>, ProcessError> {
        if self.state != ProcessState::Idle {
            return Err(self.invalid_state("request_critical_section"));
        }

        self.state = ProcessState::Requesting;
        let seq = self.request_vector.increment(self.id);

        if self.token.is_some() {
            tracing::debug!(process = %self.id, seq, "Requested while holding token");
            self.state = ProcessState::WaitingForToken;
            return Ok(vec![ProcessAction::EnterCriticalSection]);
        }

        tracing::debug!(process = %self.id, seq, "Broadcasting request");
        self.state = ProcessState::WaitingForToken;
        self.waiting_since = Some(now);

        Ok(vec![ProcessAction::Broadcast(RequestMessage { sender: self.id, seq })])
    }

    /// Handle a request broadcast. Callable in any state.
    ///
    /// Stale and duplicate requests are absorbed. The holder admits a fresh
    /// request to the pending queue, and an idle holder passes the token on
    /// straight away.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::UnknownProcess`] if the sender is outside the
    /// system.
    pub fn on_receive_request(
        &mut self,
        request: RequestMessage,
    ) -> Result<Vec<ProcessAction>, ProcessError> {
        let sender = request.sender;
        if sender.index() >= self.process_count() {
            return Err(ProcessError::UnknownProcess {
                process: sender.as_u32(),
                count: self.process_count(),
            });
        }

        if !self.request_vector.observe(sender, request.seq) {
            tracing::trace!(
                process = %self.id,
                sender = %sender,
                seq = request.seq,
                known = self.request_vector.get(sender),
                "Stale request absorbed"
            );
        }

        let Some(token) = self.token.as_mut() else {
            return Ok(Vec::new());
        };

        if sender != self.id && token.admit_if_eligible(sender, request.seq) {
            tracing::debug!(process = %self.id, sender = %sender, seq = request.seq, "Admitted request");
        }

        if self.state == ProcessState::Idle {
            return Ok(self.dispatch().into_iter().collect());
        }

        Ok(Vec::new())
    }

    /// Take ownership of a token sent by the previous holder.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::MalformedToken`] if the token covers a different
    ///   number of processes
    /// - [`ProcessError::ProtocolViolation`] if this process already holds a
    ///   token
    pub fn on_receive_token(&mut self, token: Token) -> Result<Vec<ProcessAction>, ProcessError> {
        check_dimension(&token, self.process_count())?;

        if self.token.is_some() {
            return Err(self.violation("receive_token", "token already held"));
        }

        tracing::debug!(process = %self.id, state = ?self.state, "Received token");
        self.token = Some(token);

        match self.state {
            ProcessState::WaitingForToken => {
                self.waiting_since = None;
                Ok(vec![ProcessAction::EnterCriticalSection])
            },
            ProcessState::Idle => Ok(self.dispatch().into_iter().collect()),
            // Neither state is observable between calls
            ProcessState::Requesting | ProcessState::InCriticalSection => Ok(Vec::new()),
        }
    }

    /// Route a message from the transport to the matching handler.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Process::on_receive_request`] and
    /// [`Process::on_receive_token`].
    pub fn on_message(&mut self, envelope: Envelope) -> Result<Vec<ProcessAction>, ProcessError> {
        match envelope.message {
            Message::Request(request) => self.on_receive_request(request),
            Message::Token(token) => self.on_receive_token(token),
        }
    }

    /// Enter the critical section.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::ProtocolViolation`] if the token is not held
    /// - [`ProcessError::InvalidState`] if there is no outstanding request
    pub fn enter_critical_section(&mut self) -> Result<(), ProcessError> {
        if self.token.is_none() {
            return Err(self.violation("enter_critical_section", "token not held"));
        }

        if self.state != ProcessState::WaitingForToken {
            return Err(self.invalid_state("enter_critical_section"));
        }

        tracing::debug!(
            process = %self.id,
            seq = self.request_vector.get(self.id),
            "Entered critical section"
        );
        self.state = ProcessState::InCriticalSection;
        self.waiting_since = None;
        Ok(())
    }

    /// Leave the critical section and pass the token on if anyone is
    /// waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::ProtocolViolation`] unless the process is in
    /// its critical section holding the token.
    pub fn release_critical_section(&mut self) -> Result<Vec<ProcessAction>, ProcessError> {
        if self.state != ProcessState::InCriticalSection || self.token.is_none() {
            return Err(self.violation("release_critical_section", "not in critical section"));
        }

        tracing::debug!(process = %self.id, "Released critical section");
        self.state = ProcessState::Idle;

        Ok(self.dispatch().into_iter().collect())
    }

    /// Check the liveness timeout of an outstanding request.
    ///
    /// Emits [`ProcessAction::LivenessTimeout`] once per elapsed timeout
    /// period, followed by a re-broadcast of the same request when
    /// resubmission is enabled. A process that already holds the token never
    /// times out.
    pub fn tick(&mut self, now: Instant) -> Vec<ProcessAction> {
        let (Some(timeout), Some(since)) = (self.config.liveness_timeout, self.waiting_since)
        else {
            return Vec::new();
        };

        if self.state != ProcessState::WaitingForToken || self.token.is_some() {
            return Vec::new();
        }

        let waited = now.saturating_duration_since(since);
        if waited < timeout {
            return Vec::new();
        }

        let seq = self.request_vector.get(self.id);
        tracing::warn!(process = %self.id, seq, waited = ?waited, "Liveness timeout");
        self.waiting_since = Some(now);

        let mut actions = vec![ProcessAction::LivenessTimeout { waited }];
        if self.config.resubmit_on_timeout {
            actions.push(ProcessAction::Broadcast(RequestMessage { sender: self.id, seq }));
        }
        actions
    }

    /// Record the own grant, sweep for eligible requests and hand the token
    /// to the head of the queue.
    fn dispatch(&mut self) -> Option<ProcessAction> {
        let token = self.token.as_mut()?;

        token.record_own_grant(self.id, self.request_vector.get(self.id));

        for j in ProcessId::all(self.request_vector.len()) {
            if token.admit_if_eligible(j, self.request_vector.get(j)) {
                tracing::debug!(process = %self.id, admitted = %j, "Sweep admitted request");
            }
        }

        let Some(to) = token.next_grantee() else {
            tracing::debug!(process = %self.id, "Token remains with holder");
            return None;
        };
        let token = self.token.take()?;

        tracing::debug!(process = %self.id, to = %to, "Transferring token");
        Some(ProcessAction::TransferToken { to, token })
    }

    fn invalid_state(&self, operation: &'static str) -> ProcessError {
        ProcessError::InvalidState { process: self.id, operation, state: self.state }
    }

    fn violation(&self, operation: &'static str, reason: &'static str) -> ProcessError {
        ProcessError::ProtocolViolation { process: self.id, operation, state: self.state, reason }
    }
}

fn check_dimension(token: &Token, process_count: usize) -> Result<(), ProcessError> {
    if token.process_count() != process_count {
        return Err(ProcessError::MalformedToken(format!(
            "token covers {} processes, expected {}",
            token.process_count(),
            process_count
        )));
    }
    Ok(())
}
