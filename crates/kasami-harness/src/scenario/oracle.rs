//! Oracle functions for scenario verification.
//!
//! Oracle functions run at the end of scenarios to verify global consistency.
//! They receive the final world state and check what the scenario promised.

use kasami_core::{ProcessId, ProcessState};

use crate::scenario::World;

/// Oracle function type.
///
/// Receives immutable reference to world state and returns:
/// - `Ok(())` if all invariants hold
/// - `Err(message)` if verification fails
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;

/// Every request was served and every process is idle.
pub fn all_served() -> OracleFn {
    Box::new(|world| {
        for process in world.processes() {
            let id = process.id();
            if world.entries(id) != world.requests(id) {
                return Err(format!(
                    "{} entered {} times for {} requests",
                    id,
                    world.entries(id),
                    world.requests(id)
                ));
            }
            if process.state() != ProcessState::Idle {
                return Err(format!("{} ended in {:?}", id, process.state()));
            }
        }
        Ok(())
    })
}

/// The token rests at `holder`.
pub fn token_at(holder: u32) -> OracleFn {
    let holder = ProcessId::new(holder);
    Box::new(move |world| match world.token_holder() {
        Some(id) if id == holder => Ok(()),
        other => Err(format!("token at {:?}, expected {}", other, holder)),
    })
}

/// Processes entered their critical sections in exactly this order.
pub fn entry_order(expected: &[u32]) -> OracleFn {
    let expected: Vec<ProcessId> = expected.iter().copied().map(ProcessId::new).collect();
    Box::new(move |world| {
        let actual = world.entry_order();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("entry order {:?}, expected {:?}", actual, expected))
        }
    })
}

/// The resting token's grant vector equals `expected`.
pub fn grants_are(expected: Vec<u64>) -> OracleFn {
    Box::new(move |world| {
        let token = world
            .processes()
            .iter()
            .find_map(|p| p.token())
            .ok_or_else(|| "token is in flight".to_string())?;

        if token.grants() == expected.as_slice() {
            Ok(())
        } else {
            Err(format!("LN = {:?}, expected {:?}", token.grants(), expected))
        }
    })
}

/// Exactly `count` frames were sent.
pub fn frames_sent(count: usize) -> OracleFn {
    Box::new(move |world| {
        if world.frames_sent() == count {
            Ok(())
        } else {
            Err(format!("{} frames sent, expected {}", world.frames_sent(), count))
        }
    })
}

/// Combine multiple oracles into one.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in oracles {
            oracle(world)?;
        }
        Ok(())
    })
}
