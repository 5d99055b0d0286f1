//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern: a list of [`Step`]s run against a fresh [`World`],
//! followed by a mandatory oracle.

use std::time::Duration;

use kasami_core::{ProcessConfig, ProcessId, ProcessState, RequestMessage, SystemConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    invariants::InvariantRegistry,
    scenario::{OracleFn, World},
};

/// One step of a scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Process requests its critical section
    Request(ProcessId),
    /// Deliver the oldest frame on one channel
    Deliver {
        /// Sender
        from: ProcessId,
        /// Receiver
        to: ProcessId,
    },
    /// Deliver until nothing is in flight, without releasing
    DeliverAll,
    /// Process leaves its critical section
    Release(ProcessId),
    /// Put a copy of a request on the network again
    InjectRequest {
        /// Receiver
        to: ProcessId,
        /// The request to replay
        request: RequestMessage,
    },
    /// Move virtual time forward and tick every process
    Advance(Duration),
    /// Deliver everything and release every critical section until quiet
    Quiesce,
    /// Seeded random interleaving of requests, deliveries, releases and
    /// time, followed by [`Step::Quiesce`]
    Random {
        /// RNG seed
        seed: u64,
        /// Number of random actions
        steps: usize,
    },
}

/// Scenario builder.
///
/// Configure the system, list the steps, then add an oracle to get a
/// [`RunnableScenario`].
pub struct Scenario {
    config: SystemConfig,
    registry: Option<InvariantRegistry>,
    steps: Vec<Step>,
}

impl Scenario {
    /// Scenario over `process_count` processes, `P0` holding the token.
    pub fn new(process_count: usize) -> Self {
        Self { config: SystemConfig::new(process_count), registry: None, steps: Vec::new() }
    }

    /// Start with the token at `holder`.
    pub fn with_initial_holder(mut self, holder: ProcessId) -> Self {
        self.config = self.config.with_initial_holder(holder);
        self
    }

    /// Configure every process.
    pub fn with_process_config(mut self, config: ProcessConfig) -> Self {
        self.config = self.config.with_process_config(config);
        self
    }

    /// Check a custom set of invariants instead of the standard one.
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Append [`Step::Request`].
    pub fn request(self, id: u32) -> Self {
        self.step(Step::Request(ProcessId::new(id)))
    }

    /// Append [`Step::Deliver`].
    pub fn deliver(self, from: u32, to: u32) -> Self {
        self.step(Step::Deliver { from: ProcessId::new(from), to: ProcessId::new(to) })
    }

    /// Append [`Step::Release`].
    pub fn release(self, id: u32) -> Self {
        self.step(Step::Release(ProcessId::new(id)))
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute every step, then the oracle.
    ///
    /// Invariants are checked after every step. Returns the final world so
    /// callers can compare runs.
    ///
    /// # Errors
    ///
    /// Returns the first failing step, invariant or oracle check.
    pub fn run(self) -> Result<World, String> {
        let Scenario { config, registry, steps } = self.scenario;
        let mut world = match registry {
            Some(registry) => World::with_registry(&config, registry)?,
            None => World::new(&config)?,
        };

        for (index, step) in steps.into_iter().enumerate() {
            tracing::trace!(index, ?step, "Scenario step");
            execute_step(&mut world, step).map_err(|e| format!("step {}: {}", index, e))?;
        }

        (self.oracle)(&world)?;

        Ok(world)
    }
}

fn execute_step(world: &mut World, step: Step) -> Result<(), String> {
    match step {
        Step::Request(id) => world.request(id),
        Step::Deliver { from, to } => {
            if world.deliver(from, to)? {
                Ok(())
            } else {
                Err(format!("nothing in flight from {} to {}", from, to))
            }
        },
        Step::DeliverAll => world.deliver_all().map(|_| ()),
        Step::Release(id) => world.release(id),
        Step::InjectRequest { to, request } => world.inject_request(to, request),
        Step::Advance(by) => world.advance(by),
        Step::Quiesce => world.quiesce(),
        Step::Random { seed, steps } => {
            run_random(world, seed, steps)?;
            world.quiesce()
        },
    }
}

/// Random interleaving driven by `seed`. The same seed always produces the
/// same sequence of steps.
fn run_random(world: &mut World, seed: u64, steps: usize) -> Result<(), String> {
    tracing::debug!(seed, steps, "Running random schedule");
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let n = world.process_count();

    for _ in 0..steps {
        match rng.gen_range(0..10) {
            0..=2 => {
                let id = ProcessId::new(rng.gen_range(0..n as u32));
                if world.process(id).state() == ProcessState::Idle {
                    world.request(id)?;
                }
            },
            3..=7 => {
                let ready = world.ready_channels();
                if !ready.is_empty() {
                    let (from, to) = ready[rng.gen_range(0..ready.len())];
                    world.deliver(from, to)?;
                }
            },
            8 => {
                if let Some(id) = world.in_critical_section() {
                    world.release(id)?;
                }
            },
            _ => {
                world.advance(Duration::from_millis(rng.gen_range(1..=50)))?;
            },
        }
    }
    Ok(())
}
