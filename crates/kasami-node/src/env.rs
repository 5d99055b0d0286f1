//! Production environment.

use std::time::{Duration, Instant};

use kasami_core::env::Environment;
use rand::{RngCore, rngs::OsRng};

/// Tokio clock and OS entropy.
///
/// Time comes from [`tokio::time::Instant`], so paused-time tests drive it
/// like any other Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_clock() {
        let env = SystemEnv::new();
        let start = env.now();

        env.sleep(Duration::from_secs(3)).await;

        assert!(env.now() - start >= Duration::from_secs(3));
    }

    #[test]
    fn random_bytes_fill_buffer() {
        let env = SystemEnv::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);
        assert_ne!(a, b);
    }
}
