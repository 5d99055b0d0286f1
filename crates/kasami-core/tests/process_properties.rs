//! Property-based tests for the process state machine.
//!
//! These tests drive a whole system through arbitrary interleavings of
//! requests, deliveries, duplicate deliveries and releases, and verify after
//! every step:
//! - At most one process is in its critical section
//! - Exactly one token exists (held or in flight)
//! - Request and grant vectors never decrease
//! - Every request is eventually granted once the system drains

use std::{
    collections::{BTreeMap, VecDeque},
    time::Instant,
};

use kasami_core::{
    Envelope, Message, Process, ProcessAction, ProcessId, ProcessState, RequestMessage,
    SystemConfig, create_system,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Request(usize),
    Deliver(usize),
    Duplicate(usize),
    Release,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => any::<usize>().prop_map(Op::Request),
        5 => any::<usize>().prop_map(Op::Deliver),
        1 => any::<usize>().prop_map(Op::Duplicate),
        2 => Just(Op::Release),
    ]
}

/// Minimal in-memory driver with per-pair FIFO channels
struct Sim {
    procs: Vec<Process>,
    channels: BTreeMap<(ProcessId, ProcessId), VecDeque<Envelope>>,
    delivered: Vec<(ProcessId, RequestMessage)>,
    last_rn: Vec<Vec<u64>>,
    last_ln: Vec<u64>,
    requested: Vec<u64>,
    entered: Vec<u64>,
    now: Instant,
}

impl Sim {
    fn new(n: usize, holder: u32) -> Self {
        let config = SystemConfig::new(n).with_initial_holder(ProcessId::new(holder));
        Self {
            procs: create_system(&config).expect("valid config"),
            channels: BTreeMap::new(),
            delivered: Vec::new(),
            last_rn: vec![vec![0; n]; n],
            last_ln: vec![0; n],
            requested: vec![0; n],
            entered: vec![0; n],
            now: Instant::now(),
        }
    }

    fn n(&self) -> usize {
        self.procs.len()
    }

    fn execute(&mut self, from: ProcessId, actions: Vec<ProcessAction>) {
        for action in actions {
            match action {
                ProcessAction::Broadcast(request) => {
                    for to in ProcessId::all(self.n()) {
                        if to != from {
                            self.push(from, to, Envelope::request(request));
                        }
                    }
                },
                ProcessAction::TransferToken { to, token } => {
                    self.push(from, to, Envelope::token(from, token));
                },
                ProcessAction::EnterCriticalSection => {
                    self.procs[from.index()].enter_critical_section().expect("holder enters");
                    self.entered[from.index()] += 1;
                },
                ProcessAction::LivenessTimeout { .. } => {},
            }
        }
    }

    fn push(&mut self, from: ProcessId, to: ProcessId, envelope: Envelope) {
        self.channels.entry((from, to)).or_default().push_back(envelope);
    }

    fn non_empty_channels(&self) -> Vec<(ProcessId, ProcessId)> {
        self.channels.iter().filter(|(_, q)| !q.is_empty()).map(|(k, _)| *k).collect()
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Request(i) => {
                let i = i % self.n();
                if self.procs[i].state() == ProcessState::Idle {
                    let actions =
                        self.procs[i].request_critical_section(self.now).expect("idle request");
                    self.requested[i] += 1;
                    let id = self.procs[i].id();
                    self.execute(id, actions);
                }
            },
            Op::Deliver(k) => {
                let ready = self.non_empty_channels();
                if !ready.is_empty() {
                    let (from, to) = ready[k % ready.len()];
                    self.deliver(from, to);
                }
            },
            Op::Duplicate(k) => {
                if !self.delivered.is_empty() {
                    let (to, request) = self.delivered[k % self.delivered.len()];
                    self.push(request.sender, to, Envelope::request(request));
                }
            },
            Op::Release => {
                if let Some(i) =
                    self.procs.iter().position(|p| p.state() == ProcessState::InCriticalSection)
                {
                    let actions = self.procs[i].release_critical_section().expect("release");
                    let id = self.procs[i].id();
                    self.execute(id, actions);
                }
            },
        }
    }

    fn deliver(&mut self, from: ProcessId, to: ProcessId) {
        let Some(envelope) = self.channels.get_mut(&(from, to)).and_then(VecDeque::pop_front) else {
            return;
        };

        if let Message::Request(request) = &envelope.message {
            self.delivered.push((to, *request));
        }

        let actions = self.procs[to.index()].on_message(envelope).expect("valid message");
        self.execute(to, actions);
    }

    /// Deliver everything and release every critical section until quiet.
    fn drain(&mut self) {
        for _ in 0..100_000 {
            if let Some(&(from, to)) = self.non_empty_channels().first() {
                self.deliver(from, to);
                self.check();
            } else if self.procs.iter().any(|p| p.state() == ProcessState::InCriticalSection) {
                self.apply(&Op::Release);
                self.check();
            } else {
                return;
            }
        }
        panic!("system did not quiesce");
    }

    fn check(&mut self) {
        let in_cs =
            self.procs.iter().filter(|p| p.state() == ProcessState::InCriticalSection).count();
        assert!(in_cs <= 1, "{in_cs} processes in critical section");

        let held: Vec<_> = self.procs.iter().filter_map(Process::token).collect();
        let in_flight: Vec<_> = self
            .channels
            .values()
            .flatten()
            .filter_map(|e| match &e.message {
                Message::Token(token) => Some(token),
                Message::Request(_) => None,
            })
            .collect();
        assert_eq!(held.len() + in_flight.len(), 1, "exactly one token must exist");

        let token = held.into_iter().chain(in_flight).next().expect("one token");
        for (j, &granted) in token.grants().iter().enumerate() {
            assert!(granted >= self.last_ln[j], "LN[{j}] regressed");
        }
        self.last_ln = token.grants().to_vec();

        let mut seen = vec![false; self.n()];
        for id in token.pending() {
            assert!(!seen[id.index()], "{id} queued twice");
            seen[id.index()] = true;
        }

        for (i, proc) in self.procs.iter().enumerate() {
            let rn = proc.request_vector().as_slice();
            for (j, &count) in rn.iter().enumerate() {
                assert!(count >= self.last_rn[i][j], "RN[{j}] regressed at P{i}");
            }
            self.last_rn[i] = rn.to_vec();
        }
    }
}

#[test]
fn prop_safety_and_eventual_grant() {
    proptest!(|(
        n in 1usize..=5,
        holder in 0u32..5,
        ops in prop::collection::vec(op_strategy(), 0..200),
    )| {
        let holder = holder % n as u32;
        let mut sim = Sim::new(n, holder);

        for op in &ops {
            sim.apply(op);
            sim.check();
        }

        sim.drain();

        for (i, proc) in sim.procs.iter().enumerate() {
            prop_assert_eq!(proc.state(), ProcessState::Idle);
            prop_assert_eq!(sim.entered[i], sim.requested[i], "P{} not served", i);
        }
    });
}

#[test]
fn prop_every_process_served_once_per_round() {
    proptest!(|(n in 2usize..=6, rounds in 1usize..=4, order in any::<u64>())| {
        let mut sim = Sim::new(n, 0);

        for _ in 0..rounds {
            for i in 0..n {
                sim.apply(&Op::Request(i));
            }
            // Deliver in a rotating order derived from `order`
            let mut step = order as usize;
            while !sim.non_empty_channels().is_empty() {
                sim.apply(&Op::Deliver(step));
                sim.check();
                step = step.wrapping_mul(31).wrapping_add(7);
                if step % 3 == 0 {
                    sim.apply(&Op::Release);
                    sim.check();
                }
            }
            sim.drain();
        }

        for i in 0..n {
            prop_assert_eq!(sim.entered[i], rounds as u64);
        }
        let holder = sim.procs.iter().find_map(Process::token).expect("token at rest");
        prop_assert!(holder.grants().iter().all(|&g| g == rounds as u64));
    });
}

#[test]
fn prop_duplicates_never_double_queue() {
    proptest!(|(n in 2usize..=5, copies in 1usize..=5)| {
        let mut sim = Sim::new(n, 0);
        sim.apply(&Op::Request(0));
        for i in 1..n {
            sim.apply(&Op::Request(i));
        }

        // Deliver every request to P0 several times while it is in its
        // critical section
        for from in ProcessId::all(n).skip(1) {
            let request = RequestMessage { sender: from, seq: 1 };
            for _ in 0..copies {
                let actions = sim.procs[0].on_receive_request(request).expect("valid");
                prop_assert!(actions.is_empty());
            }
        }

        let token = sim.procs[0].token().expect("holder");
        prop_assert_eq!(token.pending().len(), n - 1);
    });
}
