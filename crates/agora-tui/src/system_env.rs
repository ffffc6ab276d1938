//! Production Environment implementation using system time and RNG.
//!
//! Time comes from `std::time::Instant`, which advances on its own, and
//! randomness from the OS (getrandom). Neither is reproducible, which is what
//! the simulation environment exists for.

use agora_core::Environment;

/// Production environment using system time and the OS RNG.
///
/// Randomness feeds request ids and reconnect jitter.
///
/// # Panics
///
/// Panics if the OS RNG fails. Request ids must not repeat within a session,
/// and a host without working randomness cannot guarantee that.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
    }

    #[test]
    fn system_env_random_u64_differs() {
        let env = SystemEnv::new();
        assert_ne!(env.random_u64(), env.random_u64());
    }
}
