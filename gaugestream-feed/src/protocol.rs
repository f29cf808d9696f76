//! Provider wire-frame parsing.
//!
//! Incoming payloads are parsed defensively: malformed or non-object frames,
//! unknown event kinds, and frames with missing or non-positive required
//! fields are dropped silently. A dropped frame is a diagnostic count, never
//! an error.

use crate::tick::{SourceKind, Symbol};
use serde::{Deserialize, Deserializer};

/// Deserialize a JSON string field into an `f64` (providers quote numerics).
fn de_str_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = <&str as Deserialize>::deserialize(deserializer)?;
    raw.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Combined-stream envelope: `{"stream": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    #[allow(dead_code)]
    stream: Option<String>,
    data: ProviderFrame,
}

/// Event frames the connection understands, tagged by the provider's `e`
/// field. Everything else fails deserialization and is dropped upstream.
#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
enum ProviderFrame {
    /// Trade-level framing: price in `p`, event time in `T` (epoch ms).
    #[serde(rename = "trade")]
    Trade {
        #[serde(rename = "s")]
        symbol: String,
        #[serde(rename = "p", deserialize_with = "de_str_f64")]
        price: f64,
        #[serde(rename = "T")]
        time_ms: i64,
    },
    /// Aggregated ticker framing: last price in `c`, event time in `E`.
    #[serde(rename = "24hrMiniTicker")]
    MiniTicker {
        #[serde(rename = "s")]
        symbol: String,
        #[serde(rename = "c", deserialize_with = "de_str_f64")]
        price: f64,
        #[serde(rename = "E")]
        time_ms: i64,
    },
}

/// A validated, provider-agnostic observation extracted from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTick {
    pub symbol: Symbol,
    pub price: f64,
    /// Provider timestamp converted to fractional seconds.
    pub timestamp: f64,
    pub source: SourceKind,
}

impl RawTick {
    fn from_frame(frame: ProviderFrame) -> Option<Self> {
        let (symbol, price, time_ms, source) = match frame {
            ProviderFrame::Trade {
                symbol,
                price,
                time_ms,
            } => (symbol, price, time_ms, SourceKind::Trade),
            ProviderFrame::MiniTicker {
                symbol,
                price,
                time_ms,
            } => (symbol, price, time_ms, SourceKind::Ticker),
        };

        if symbol.is_empty() || price <= 0.0 || time_ms <= 0 {
            return None;
        }

        Some(Self {
            symbol: Symbol::new(symbol),
            price,
            timestamp: time_ms as f64 / 1000.0,
            source,
        })
    }
}

/// Parse one text payload into a tick, accepting both the combined-stream
/// envelope and bare frames. Returns `None` for anything unusable.
pub fn parse_frame(text: &str) -> Option<RawTick> {
    if let Ok(envelope) = serde_json::from_str::<StreamEnvelope>(text) {
        return RawTick::from_frame(envelope.data);
    }
    serde_json::from_str::<ProviderFrame>(text)
        .ok()
        .and_then(RawTick::from_frame)
}
