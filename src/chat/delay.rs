//! Typing delay — how long the bot "types" before a message appears.
//!
//! The engine asks a `TypingDelay` for every scheduled bot message, so hosts
//! pick between live-looking jitter and a fixed delay, and tests can script
//! exact timings.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ChatConfig;

/// Source of per-message typing latency.
pub trait TypingDelay: Send {
    fn typing_delay(&mut self) -> Duration;
}

/// `min` plus a uniform random extra in `0..=jitter`, millisecond resolution.
pub struct JitteredDelay {
    min: Duration,
    jitter_ms: u64,
    rng: StdRng,
}

impl JitteredDelay {
    #[must_use]
    pub fn new(min: Duration, jitter: Duration) -> Self {
        Self::with_rng(min, jitter, StdRng::from_os_rng())
    }

    /// Deterministic sequence for reproducible runs.
    #[must_use]
    pub fn seeded(min: Duration, jitter: Duration, seed: u64) -> Self {
        Self::with_rng(min, jitter, StdRng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.typing_min, config.typing_jitter)
    }

    fn with_rng(min: Duration, jitter: Duration, rng: StdRng) -> Self {
        let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        Self { min, jitter_ms, rng }
    }
}

impl TypingDelay for JitteredDelay {
    fn typing_delay(&mut self) -> Duration {
        if self.jitter_ms == 0 {
            return self.min;
        }
        self.min + Duration::from_millis(self.rng.random_range(0..=self.jitter_ms))
    }
}

/// The same delay every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl TypingDelay for FixedDelay {
    fn typing_delay(&mut self) -> Duration {
        self.0
    }
}

#[cfg(test)]
#[path = "delay_test.rs"]
mod tests;
