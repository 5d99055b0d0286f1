//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples drivers from system resources (time,
//! randomness). The process state machine itself never calls into an
//! environment: it receives `now` as an argument. Drivers use the
//! environment to obtain that `now`, to sleep through a critical section and
//! to pick randomized dwell times.
//!
//! The environment is implemented twice:
//!
//! 1. `SimEnv` (kasami-harness): Turmoil's virtual clock and a seeded RNG
//! 2. `SystemEnv` (kasami-node): Tokio's clock and OS entropy
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async sleeping.
///
/// Both implementations report time as [`std::time::Instant`], which is the
/// type [`Process`](crate::process::Process) accepts. Virtual clocks map their
/// elapsed simulation time onto an `Instant` captured at creation.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// Subsequent calls must return times >= previous calls.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// - Simulation: advances virtual time, no wall-clock delay
    /// - Production: yields to the Tokio scheduler
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Simulation implementations MUST be seeded and log the seed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Uniform-ish duration in `[min, max]` at millisecond resolution.
    ///
    /// Used by drivers to randomize how long a process stays in its critical
    /// section. Returns `min` when `max <= min`.
    fn random_duration(&self, min: Duration, max: Duration) -> Duration {
        let span = max.saturating_sub(min).as_millis();
        if span == 0 {
            return min;
        }

        // span fits in u64 for any realistic dwell range
        let span = u64::try_from(span).unwrap_or(u64::MAX);
        let offset = self.random_u64() % span.saturating_add(1);
        min + Duration::from_millis(offset)
    }
}
