//! World state for scenario execution.
//!
//! The World owns every process of one system and the network between them:
//! one FIFO channel per ordered pair of processes, holding encoded frames.
//! Messages are encoded when sent and decoded when delivered, so every
//! scenario also exercises the wire format.
//!
//! Nothing is delivered unless a step asks for it, which lets a scenario
//! pick any interleaving the real network could produce. After every step
//! the [`InvariantRegistry`] is checked against a fresh snapshot.

use std::{
    collections::{BTreeMap, VecDeque},
    time::{Duration, Instant},
};

use kasami_core::{
    Envelope, Message, Process, ProcessAction, ProcessId, ProcessState, RequestMessage,
    SystemConfig, create_system,
};
use kasami_proto::{Frame, MessageKind};

use crate::invariants::{InvariantRegistry, SystemSnapshot};

/// Upper bound on steps taken by [`World::deliver_all`] and
/// [`World::quiesce`]
const MAX_DRAIN_STEPS: usize = 100_000;

/// Observable events, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    /// A process made a request
    Requested {
        /// Requesting process
        process: ProcessId,
        /// Its new `RN[process]`
        seq: u64,
    },
    /// A frame was put on a channel
    Sent {
        /// Sender
        from: ProcessId,
        /// Receiver
        to: ProcessId,
        /// What the frame carries
        kind: MessageKind,
    },
    /// A frame was taken off a channel and handled
    Delivered {
        /// Sender
        from: ProcessId,
        /// Receiver
        to: ProcessId,
        /// What the frame carried
        kind: MessageKind,
    },
    /// A process entered its critical section
    Entered {
        /// Process
        process: ProcessId,
        /// Request being served
        seq: u64,
    },
    /// A process left its critical section
    Released {
        /// Process
        process: ProcessId,
        /// Request that was served
        seq: u64,
    },
    /// A waiting process reported a liveness timeout
    TimedOut {
        /// Waiting process
        process: ProcessId,
        /// How long it had waited
        waited: Duration,
    },
    /// Virtual time moved forward
    Advanced {
        /// Amount
        by: Duration,
    },
}

/// All processes of a system and the channels between them
pub struct World {
    processes: Vec<Process>,
    channels: BTreeMap<(ProcessId, ProcessId), VecDeque<Vec<u8>>>,
    now: Instant,
    registry: InvariantRegistry,
    previous: Option<SystemSnapshot>,
    events: Vec<WorldEvent>,
    requests: Vec<u64>,
    entries: Vec<u64>,
    frames_sent: usize,
    frames_delivered: usize,
}

impl World {
    /// Create the processes of `config`, checked against the standard
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: &SystemConfig) -> Result<Self, String> {
        Self::with_registry(config, InvariantRegistry::standard())
    }

    /// Create the processes of `config`, checked against `registry`.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the initial state
    /// already violates an invariant.
    pub fn with_registry(config: &SystemConfig, registry: InvariantRegistry) -> Result<Self, String> {
        let processes =
            create_system(config).map_err(|e| format!("create_system failed: {}", e))?;
        let n = processes.len();

        let mut world = Self {
            processes,
            channels: BTreeMap::new(),
            now: Instant::now(),
            registry,
            previous: None,
            events: Vec::new(),
            requests: vec![0; n],
            entries: vec![0; n],
            frames_sent: 0,
            frames_delivered: 0,
        };
        world.check()?;
        Ok(world)
    }

    /// Number of processes
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Process `id`
    ///
    /// Panics if `id` is out of range.
    pub fn process(&self, id: ProcessId) -> &Process {
        &self.processes[id.index()]
    }

    /// Every process, indexed by id
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Current virtual time
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Every event so far
    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    /// Processes in the order they entered their critical sections
    pub fn entry_order(&self) -> Vec<ProcessId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                WorldEvent::Entered { process, .. } => Some(*process),
                _ => None,
            })
            .collect()
    }

    /// Number of requests `id` has made
    pub fn requests(&self, id: ProcessId) -> u64 {
        self.requests[id.index()]
    }

    /// Number of times `id` entered its critical section
    pub fn entries(&self, id: ProcessId) -> u64 {
        self.entries[id.index()]
    }

    /// Frames put on any channel
    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    /// Frames delivered from any channel
    pub fn frames_delivered(&self) -> usize {
        self.frames_delivered
    }

    /// Frames sent but not yet delivered
    pub fn in_flight(&self) -> usize {
        self.channels.values().map(VecDeque::len).sum()
    }

    /// Channels with at least one frame waiting, in `(from, to)` order
    pub fn ready_channels(&self) -> Vec<(ProcessId, ProcessId)> {
        self.channels.iter().filter(|(_, queue)| !queue.is_empty()).map(|(key, _)| *key).collect()
    }

    /// Process currently holding the token, if it is not in flight
    pub fn token_holder(&self) -> Option<ProcessId> {
        self.processes.iter().find(|p| p.holds_token()).map(Process::id)
    }

    /// Process currently in its critical section
    pub fn in_critical_section(&self) -> Option<ProcessId> {
        self.processes
            .iter()
            .find(|p| p.state() == ProcessState::InCriticalSection)
            .map(Process::id)
    }

    /// Whether no frame is in flight and no process is in its critical
    /// section
    pub fn is_quiescent(&self) -> bool {
        self.in_flight() == 0 && self.in_critical_section().is_none()
    }

    /// `id` requests its critical section.
    ///
    /// # Errors
    ///
    /// Returns error if the process rejects the request or an invariant
    /// fails.
    pub fn request(&mut self, id: ProcessId) -> Result<(), String> {
        let now = self.now;
        let process = self.process_mut(id)?;
        let actions = process
            .request_critical_section(now)
            .map_err(|e| format!("{} request failed: {}", id, e))?;
        let seq = process.request_vector().get(id);

        self.requests[id.index()] += 1;
        self.events.push(WorldEvent::Requested { process: id, seq });
        self.execute(id, actions)?;
        self.check()
    }

    /// Deliver the oldest frame on the `from → to` channel.
    ///
    /// Returns `false` if the channel was empty.
    ///
    /// # Errors
    ///
    /// Returns error if the frame does not decode, the receiver rejects it,
    /// or an invariant fails.
    pub fn deliver(&mut self, from: ProcessId, to: ProcessId) -> Result<bool, String> {
        let Some(bytes) = self.channels.get_mut(&(from, to)).and_then(VecDeque::pop_front) else {
            return Ok(false);
        };

        let n = self.processes.len();
        let frame = Frame::decode(&bytes).map_err(|e| format!("{} -> {}: {}", from, to, e))?;
        let envelope =
            Envelope::from_frame(&frame, n).map_err(|e| format!("{} -> {}: {}", from, to, e))?;

        self.frames_delivered += 1;
        self.events.push(WorldEvent::Delivered { from, to, kind: kind_of(&envelope) });

        let actions = self
            .process_mut(to)?
            .on_message(envelope)
            .map_err(|e| format!("{} rejected message from {}: {}", to, from, e))?;
        self.execute(to, actions)?;
        self.check()?;
        Ok(true)
    }

    /// Deliver frames until none is in flight, always from the first channel
    /// of [`World::ready_channels`]: lowest sender, then lowest recipient.
    ///
    /// Critical sections are not released, so a process that enters keeps
    /// the token.
    ///
    /// # Errors
    ///
    /// Returns error if a delivery fails or the network does not drain.
    pub fn deliver_all(&mut self) -> Result<usize, String> {
        let mut delivered = 0;
        while let Some(&(from, to)) = self.ready_channels().first() {
            if delivered == MAX_DRAIN_STEPS {
                return Err(format!("network did not drain after {} deliveries", delivered));
            }
            self.deliver(from, to)?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// `id` leaves its critical section.
    ///
    /// # Errors
    ///
    /// Returns error if `id` is not in its critical section or an invariant
    /// fails.
    pub fn release(&mut self, id: ProcessId) -> Result<(), String> {
        let process = self.process_mut(id)?;
        let seq = process.outstanding_request().unwrap_or_default();
        let actions =
            process.release_critical_section().map_err(|e| format!("{} release failed: {}", id, e))?;

        self.events.push(WorldEvent::Released { process: id, seq });
        self.execute(id, actions)?;
        self.check()
    }

    /// Put a copy of `request` on the `request.sender → to` channel, as a
    /// duplicated or replayed broadcast would.
    ///
    /// # Errors
    ///
    /// Returns error if either process is out of range.
    pub fn inject_request(&mut self, to: ProcessId, request: RequestMessage) -> Result<(), String> {
        self.process_mut(request.sender)?;
        self.process_mut(to)?;
        self.send(request.sender, to, &Envelope::request(request))
    }

    /// Move virtual time forward by `by` and tick every process.
    ///
    /// # Errors
    ///
    /// Returns error if an invariant fails.
    pub fn advance(&mut self, by: Duration) -> Result<(), String> {
        self.now += by;
        self.events.push(WorldEvent::Advanced { by });

        for id in ProcessId::all(self.processes.len()) {
            let actions = self.processes[id.index()].tick(self.now);
            self.execute(id, actions)?;
        }
        self.check()
    }

    /// Deliver everything and release every critical section until the
    /// system is quiescent.
    ///
    /// # Errors
    ///
    /// Returns error if a step fails or the system does not settle.
    pub fn quiesce(&mut self) -> Result<(), String> {
        for _ in 0..MAX_DRAIN_STEPS {
            if let Some(&(from, to)) = self.ready_channels().first() {
                self.deliver(from, to)?;
            } else if let Some(id) = self.in_critical_section() {
                self.release(id)?;
            } else {
                return Ok(());
            }
        }
        Err(format!("system did not quiesce after {} steps", MAX_DRAIN_STEPS))
    }

    fn process_mut(&mut self, id: ProcessId) -> Result<&mut Process, String> {
        let n = self.processes.len();
        self.processes
            .get_mut(id.index())
            .ok_or_else(|| format!("{} is not one of {} processes", id, n))
    }

    fn execute(&mut self, id: ProcessId, actions: Vec<ProcessAction>) -> Result<(), String> {
        for action in actions {
            match action {
                ProcessAction::Broadcast(request) => {
                    let envelope = Envelope::request(request);
                    for to in ProcessId::all(self.processes.len()).filter(|&to| to != id) {
                        self.send(id, to, &envelope)?;
                    }
                },
                ProcessAction::TransferToken { to, token } => {
                    self.send(id, to, &Envelope::token(id, token))?;
                },
                ProcessAction::EnterCriticalSection => {
                    let process = &mut self.processes[id.index()];
                    process
                        .enter_critical_section()
                        .map_err(|e| format!("{} enter failed: {}", id, e))?;
                    let seq = process.outstanding_request().unwrap_or_default();

                    self.entries[id.index()] += 1;
                    self.events.push(WorldEvent::Entered { process: id, seq });
                },
                ProcessAction::LivenessTimeout { waited } => {
                    self.events.push(WorldEvent::TimedOut { process: id, waited });
                },
            }
        }
        Ok(())
    }

    fn send(&mut self, from: ProcessId, to: ProcessId, envelope: &Envelope) -> Result<(), String> {
        let frame = envelope.to_frame().map_err(|e| format!("{} -> {}: {}", from, to, e))?;
        let mut bytes = Vec::with_capacity(frame.encoded_len());
        frame.encode(&mut bytes).map_err(|e| format!("{} -> {}: {}", from, to, e))?;

        self.channels.entry((from, to)).or_default().push_back(bytes);
        self.frames_sent += 1;
        self.events.push(WorldEvent::Sent { from, to, kind: kind_of(envelope) });
        Ok(())
    }

    /// Capture the system, including tokens still on a channel.
    ///
    /// # Errors
    ///
    /// Returns error if an in-flight token frame does not decode.
    pub fn snapshot(&self) -> Result<SystemSnapshot, String> {
        let n = self.processes.len();
        let mut snapshot = SystemSnapshot::from_processes(&self.processes);

        for (&(from, to), queue) in &self.channels {
            for bytes in queue {
                let frame = Frame::decode(bytes).map_err(|e| e.to_string())?;
                if frame.header.kind_enum() != Some(MessageKind::Token) {
                    continue;
                }
                let envelope = Envelope::from_frame(&frame, n).map_err(|e| e.to_string())?;
                if let Message::Token(token) = &envelope.message {
                    snapshot = snapshot.with_in_flight(from, to, token);
                }
            }
        }
        Ok(snapshot)
    }

    fn check(&mut self) -> Result<(), String> {
        let current = self.snapshot()?;
        if let Err(violations) = self.registry.check_all(self.previous.as_ref(), &current) {
            let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
            return Err(format!("invariant violated: {}", messages.join("; ")));
        }
        self.previous = Some(current);
        Ok(())
    }
}

fn kind_of(envelope: &Envelope) -> MessageKind {
    match envelope.message {
        Message::Request(_) => MessageKind::Request,
        Message::Token(_) => MessageKind::Token,
    }
}
