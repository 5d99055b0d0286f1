//! System-wide invariants checked against snapshots.
//!
//! An [`Invariant`] states something that must hold in every reachable state
//! of the system, whatever interleaving produced it. The scenario
//! [`World`](crate::scenario::World) captures a [`SystemSnapshot`] after
//! every step and runs the [`InvariantRegistry`] against it, passing the
//! previous snapshot so monotonicity can be checked too.

use kasami_core::{Process, ProcessId, ProcessState, Token};

/// An invariant that failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{invariant}: {message}")]
pub struct Violation {
    /// Name of the failed invariant
    pub invariant: &'static str,
    /// What was observed
    pub message: String,
}

/// Result of checking one invariant
pub type InvariantResult = Result<(), Violation>;

/// Where a token was when the snapshot was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLocation {
    /// Owned by a process
    Held(ProcessId),
    /// Sent but not yet delivered
    InFlight {
        /// Sender
        from: ProcessId,
        /// Receiver
        to: ProcessId,
    },
}

/// Copy of a token's contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    /// Where the token is
    pub location: TokenLocation,
    /// `LN`
    pub grants: Vec<u64>,
    /// Pending queue, front first
    pub pending: Vec<ProcessId>,
}

impl TokenSnapshot {
    /// Capture `token` at `location`.
    pub fn of(token: &Token, location: TokenLocation) -> Self {
        Self { location, grants: token.grants().to_vec(), pending: token.pending().collect() }
    }
}

/// Copy of one process's observable state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    /// Process id
    pub id: ProcessId,
    /// State machine state
    pub state: ProcessState,
    /// `RN`
    pub request_vector: Vec<u64>,
}

/// Every process and every token at one instant
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemSnapshot {
    /// Processes, indexed by id
    pub processes: Vec<ProcessSnapshot>,
    /// Every token in the system, held or in flight
    pub tokens: Vec<TokenSnapshot>,
}

impl SystemSnapshot {
    /// Capture `processes` and the tokens they hold.
    ///
    /// Tokens in transit are added with [`SystemSnapshot::with_in_flight`].
    pub fn from_processes(processes: &[Process]) -> Self {
        let mut tokens = Vec::new();
        let processes = processes
            .iter()
            .map(|process| {
                if let Some(token) = process.token() {
                    tokens.push(TokenSnapshot::of(token, TokenLocation::Held(process.id())));
                }
                ProcessSnapshot {
                    id: process.id(),
                    state: process.state(),
                    request_vector: process.request_vector().as_slice().to_vec(),
                }
            })
            .collect();

        Self { processes, tokens }
    }

    /// Add a token travelling from `from` to `to`.
    #[must_use]
    pub fn with_in_flight(mut self, from: ProcessId, to: ProcessId, token: &Token) -> Self {
        self.tokens.push(TokenSnapshot::of(token, TokenLocation::InFlight { from, to }));
        self
    }

    /// The token, if exactly one exists
    pub fn token(&self) -> Option<&TokenSnapshot> {
        match self.tokens.as_slice() {
            [token] => Some(token),
            _ => None,
        }
    }

    /// `RN_j[j]`: how many requests process `j` has made
    pub fn own_requests(&self, id: ProcessId) -> Option<u64> {
        self.processes.get(id.index()).and_then(|p| p.request_vector.get(id.index()).copied())
    }
}

/// A property of every reachable system state
pub trait Invariant: Send + Sync {
    /// Name used in violations
    fn name(&self) -> &'static str;

    /// Check `current`. `previous` is the snapshot taken one step earlier,
    /// if any.
    ///
    /// # Errors
    ///
    /// Returns a [`Violation`] describing what does not hold.
    fn check(&self, previous: Option<&SystemSnapshot>, current: &SystemSnapshot)
    -> InvariantResult;

    /// Build a violation of this invariant.
    fn violation(&self, message: impl Into<String>) -> Violation
    where
        Self: Sized,
    {
        Violation { invariant: self.name(), message: message.into() }
    }
}

/// At most one process is in its critical section, and it holds the token.
#[derive(Debug, Default, Clone, Copy)]
pub struct MutualExclusion;

impl Invariant for MutualExclusion {
    fn name(&self) -> &'static str {
        "mutual_exclusion"
    }

    fn check(&self, _: Option<&SystemSnapshot>, current: &SystemSnapshot) -> InvariantResult {
        let inside: Vec<ProcessId> = current
            .processes
            .iter()
            .filter(|p| p.state == ProcessState::InCriticalSection)
            .map(|p| p.id)
            .collect();

        match inside.as_slice() {
            [] => Ok(()),
            [id] => {
                let holds = current.tokens.iter().any(|t| t.location == TokenLocation::Held(*id));
                if holds {
                    Ok(())
                } else {
                    Err(self.violation(format!("{id} is in its critical section without the token")))
                }
            },
            _ => Err(self.violation(format!("{inside:?} are in their critical sections"))),
        }
    }
}

/// Exactly one token exists, held or in flight.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleToken;

impl Invariant for SingleToken {
    fn name(&self) -> &'static str {
        "single_token"
    }

    fn check(&self, _: Option<&SystemSnapshot>, current: &SystemSnapshot) -> InvariantResult {
        match current.tokens.len() {
            1 => Ok(()),
            count => Err(self.violation(format!("{count} tokens exist"))),
        }
    }
}

/// No entry of any request vector decreases between steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestMonotonicity;

impl Invariant for RequestMonotonicity {
    fn name(&self) -> &'static str {
        "request_monotonicity"
    }

    fn check(&self, previous: Option<&SystemSnapshot>, current: &SystemSnapshot) -> InvariantResult {
        let Some(previous) = previous else {
            return Ok(());
        };

        for (before, after) in previous.processes.iter().zip(&current.processes) {
            for (j, (old, new)) in before.request_vector.iter().zip(&after.request_vector).enumerate()
            {
                if new < old {
                    return Err(self.violation(format!(
                        "RN[{j}] at {} went from {old} to {new}",
                        after.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// No entry of the grant vector decreases between steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantMonotonicity;

impl Invariant for GrantMonotonicity {
    fn name(&self) -> &'static str {
        "grant_monotonicity"
    }

    fn check(&self, previous: Option<&SystemSnapshot>, current: &SystemSnapshot) -> InvariantResult {
        let (Some(before), Some(after)) = (previous.and_then(SystemSnapshot::token), current.token())
        else {
            return Ok(());
        };

        for (j, (old, new)) in before.grants.iter().zip(&after.grants).enumerate() {
            if new < old {
                return Err(self.violation(format!("LN[{j}] went from {old} to {new}")));
            }
        }
        Ok(())
    }
}

/// `LN[j]` never exceeds the number of requests `j` has made.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantBound;

impl Invariant for GrantBound {
    fn name(&self) -> &'static str {
        "grant_bound"
    }

    fn check(&self, _: Option<&SystemSnapshot>, current: &SystemSnapshot) -> InvariantResult {
        for token in &current.tokens {
            for (id, &granted) in ProcessId::all(token.grants.len()).zip(&token.grants) {
                let requested = current.own_requests(id).unwrap_or_default();
                if granted > requested {
                    return Err(self.violation(format!(
                        "LN[{id}] = {granted} but {id} made {requested} requests"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The pending queue holds distinct processes, each with an unserved request.
#[derive(Debug, Default, Clone, Copy)]
pub struct PendingQueue;

impl Invariant for PendingQueue {
    fn name(&self) -> &'static str {
        "pending_queue"
    }

    fn check(&self, _: Option<&SystemSnapshot>, current: &SystemSnapshot) -> InvariantResult {
        for token in &current.tokens {
            let mut seen = vec![false; token.grants.len()];
            for &id in &token.pending {
                let Some(slot) = seen.get_mut(id.index()) else {
                    return Err(self.violation(format!("{id} queued but out of range")));
                };
                if *slot {
                    return Err(self.violation(format!("{id} queued twice")));
                }
                *slot = true;

                let requested = current.own_requests(id).unwrap_or_default();
                if token.grants[id.index()] >= requested {
                    return Err(self.violation(format!("{id} queued with no unserved request")));
                }
            }
        }
        Ok(())
    }
}

/// Set of invariants checked together
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invariant of the protocol
    pub fn standard() -> Self {
        Self::new()
            .with(MutualExclusion)
            .with(SingleToken)
            .with(RequestMonotonicity)
            .with(GrantMonotonicity)
            .with(GrantBound)
            .with(PendingQueue)
    }

    /// Add an invariant.
    #[must_use]
    pub fn with(mut self, invariant: impl Invariant + 'static) -> Self {
        self.invariants.push(Box::new(invariant));
        self
    }

    /// Number of registered invariants
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no invariant is registered
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    /// Check every invariant.
    ///
    /// # Errors
    ///
    /// Returns every violation found, in registration order.
    pub fn check_all(
        &self,
        previous: Option<&SystemSnapshot>,
        current: &SystemSnapshot,
    ) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> = self
            .invariants
            .iter()
            .filter_map(|invariant| invariant.check(previous, current).err())
            .collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }
}
