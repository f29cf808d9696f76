//! Liveness tracking for a connected session.
//!
//! Detects silent stream death that never produces an explicit transport
//! error: a stale pong (transport half-dead) or an idle data stream (remote
//! stopped publishing). Either condition trips the watchdog and forces a
//! reconnect.

use crate::tick::Symbol;
use fnv::FnvHashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Why the watchdog tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No pong received within the pong timeout.
    PongTimeout,
    /// No data message received within the idle timeout.
    IdleStream,
}

/// Pong/idle timestamps for one live session.
///
/// Recreated on every successful connect, so a reconnect always starts with
/// fresh stamps.
#[derive(Debug, Clone)]
pub struct Liveness {
    pub last_pong: Instant,
    pub last_message: Instant,
    pong_timeout: Duration,
    idle_timeout: Duration,
}

impl Liveness {
    pub fn new(pong_timeout: Duration, idle_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            last_pong: now,
            last_message: now,
            pong_timeout,
            idle_timeout,
        }
    }

    pub fn record_pong(&mut self) {
        self.last_pong = Instant::now();
    }

    pub fn record_message(&mut self) {
        self.last_message = Instant::now();
    }

    /// Watchdog trip decision at `now`.
    pub fn staleness(&self, now: Instant) -> Option<StaleReason> {
        if now.duration_since(self.last_pong) > self.pong_timeout {
            Some(StaleReason::PongTimeout)
        } else if now.duration_since(self.last_message) > self.idle_timeout {
            Some(StaleReason::IdleStream)
        } else {
            None
        }
    }
}

/// Messages-per-symbol-per-second diagnostics over a fixed duty-cycle window.
#[derive(Debug)]
pub struct MessageRate {
    window: Duration,
    window_start: Instant,
    counts: FnvHashMap<Symbol, u64>,
}

impl MessageRate {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: Instant::now(),
            counts: FnvHashMap::default(),
        }
    }

    /// Count one message for `symbol`. When the duty-cycle window has
    /// elapsed, returns the completed window's per-symbol rates and resets.
    pub fn record(&mut self, symbol: &Symbol) -> Option<Vec<(Symbol, f64)>> {
        *self.counts.entry(symbol.clone()).or_insert(0) += 1;

        let elapsed = self.window_start.elapsed();
        if elapsed < self.window {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let rates = self
            .counts
            .drain()
            .map(|(symbol, count)| (symbol, count as f64 / secs))
            .collect();
        self.window_start = Instant::now();
        Some(rates)
    }
}
