//! Reconnect scheduling policy.
//!
//! Delay grows exponentially with the attempt count, capped both by a maximum
//! exponent and an absolute ceiling, with uniform random jitter added so a
//! fleet of connections does not thunder back in lockstep.

use rand::Rng;
use std::time::Duration;

/// Reconnect backoff policy: `min(base * 2^min(attempt, cap_exp), cap)` plus
/// jitter in `[0, jitter)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub cap_exp: u32,
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
            cap_exp: 6,
            jitter: Duration::from_millis(250),
        }
    }
}

impl ReconnectPolicy {
    /// Deterministic pre-jitter delay for the given attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(self.cap_exp);
        let scaled = self
            .base
            .saturating_mul(2u32.saturating_pow(exp));
        scaled.min(self.cap)
    }

    /// Scheduled delay for the given attempt, including jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter.is_zero() {
            return base;
        }
        let jitter_ms = rand::rng().random_range(0..self.jitter.as_millis().max(1) as u64);
        base + Duration::from_millis(jitter_ms)
    }
}
