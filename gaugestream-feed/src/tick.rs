use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Abstract user-facing symbol (eg/ "BTCUSDT").
pub type Symbol = SmolStr;

/// Which provider message framing produced a [`Tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
pub enum SourceKind {
    /// Trade-level stream: one message per executed trade.
    #[display("trade")]
    Trade,
    /// Aggregated ticker stream: periodic last-price summaries.
    #[display("ticker")]
    Ticker,
}

/// Upstream data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
pub enum Provider {
    #[display("binance")]
    Binance,
}

/// Concrete market a symbol resolved to on a provider.
///
/// Some symbols only trade on one regional market, so the router tries a
/// preference chain and reports which market actually carries the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
pub enum Market {
    #[display("global")]
    Global,
    #[display("us")]
    Us,
}

/// One normalised price observation from a feed.
///
/// Immutable once created; consumed into the analytics engine and discarded.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tick {
    pub symbol: Symbol,
    /// Provider timestamp in seconds (fractional).
    pub timestamp: f64,
    /// Last price, always > 0 for a valid tick.
    pub price: f64,
    pub source: SourceKind,
    pub provider: Provider,
    pub market: Market,
    /// Monotonic per-symbol sequence number assigned on receipt.
    pub sequence: u64,
    /// Wall-clock receipt time, for latency diagnostics.
    pub time_received: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_labels() {
        assert_eq!(SourceKind::Trade.to_string(), "trade");
        assert_eq!(SourceKind::Ticker.to_string(), "ticker");
        assert_eq!(Provider::Binance.to_string(), "binance");
        assert_eq!(Market::Us.to_string(), "us");
    }

    #[test]
    fn test_tick_serde_round_trip() {
        let tick = Tick {
            symbol: Symbol::new("BTCUSDT"),
            timestamp: 1_700_000_000.25,
            price: 50_000.0,
            source: SourceKind::Trade,
            provider: Provider::Binance,
            market: Market::Global,
            sequence: 42,
            time_received: Utc::now(),
        };

        let json = serde_json::to_string(&tick).unwrap();
        let back: Tick = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tick);
    }
}
