//! Tick history persistence.
//!
//! Two interchangeable backends behind [`HistoryStore`]: newline-delimited
//! JSON snapshots written atomically, and a SQLite table indexed for
//! per-symbol range scans. Records are flat so both backends share one
//! schema.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, ToSmolStr};
use thiserror::Error;

use gaugestream_feed::tick::{Symbol, Tick};

pub mod ndjson;
pub mod sqlite;

pub use ndjson::NdjsonStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

/// Flat storage row for one tick. Enum fields are flattened to their display
/// labels so rows stay readable in both backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub symbol: Symbol,
    pub provider: SmolStr,
    pub market: SmolStr,
    pub source: SmolStr,
    pub sequence: u64,
    /// Feed timestamp, seconds since the epoch.
    pub timestamp: f64,
    pub value: f64,
}

impl From<&Tick> for TickRecord {
    fn from(tick: &Tick) -> Self {
        Self {
            symbol: tick.symbol.clone(),
            provider: tick.provider.to_smolstr(),
            market: tick.market.to_smolstr(),
            source: tick.source.to_smolstr(),
            sequence: tick.sequence,
            timestamp: tick.timestamp,
            value: tick.price,
        }
    }
}

/// Grouped load result: records per symbol, each ordered by timestamp.
pub type SymbolRecords = BTreeMap<Symbol, Vec<TickRecord>>;

/// Persistence boundary. Implementations are free to batch internally but
/// must make `save_all` all-or-nothing per call.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save_all(&self, records: &[TickRecord]) -> Result<(), PersistError>;

    async fn load_all(&self) -> Result<SymbolRecords, PersistError>;

    async fn clear(&self) -> Result<(), PersistError>;
}

fn group_by_symbol(records: Vec<TickRecord>) -> SymbolRecords {
    let mut grouped: SymbolRecords = BTreeMap::new();
    for record in records {
        grouped.entry(record.symbol.clone()).or_default().push(record);
    }
    for records in grouped.values_mut() {
        records.sort_by(|a, b| {
            a.timestamp
                .partial_cmp(&b.timestamp)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    grouped
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use chrono::Utc;
    use gaugestream_feed::tick::{Market, Provider, SourceKind};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Unique path under the system temp dir; nothing is created yet.
    pub fn scratch_path(extension: &str) -> PathBuf {
        let unique = format!(
            "gaugestream-test-{}-{}.{extension}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed),
        );
        std::env::temp_dir().join(unique)
    }

    pub fn record(symbol: &str, sequence: u64, timestamp: f64, value: f64) -> TickRecord {
        TickRecord::from(&Tick {
            symbol: SmolStr::new(symbol),
            timestamp,
            price: value,
            source: SourceKind::Trade,
            provider: Provider::Binance,
            market: Market::Global,
            sequence,
            time_received: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_util::record;

    #[test]
    fn test_record_flattens_enum_labels() {
        let record = record("BTCUSDT", 7, 100.5, 50_000.0);
        assert_eq!(record.symbol, "BTCUSDT");
        assert_eq!(record.provider, "binance");
        assert_eq!(record.market, "global");
        assert_eq!(record.source, "trade");
        assert_eq!(record.sequence, 7);
        assert_eq!(record.value, 50_000.0);
    }

    #[test]
    fn test_group_by_symbol_sorts_by_timestamp() {
        let records = vec![
            record("ETHUSDT", 2, 102.0, 3_010.0),
            record("BTCUSDT", 1, 101.0, 50_100.0),
            record("ETHUSDT", 1, 101.0, 3_000.0),
            record("BTCUSDT", 2, 100.0, 50_000.0),
        ];
        let grouped = group_by_symbol(records);

        assert_eq!(grouped.len(), 2);
        let btc = &grouped[&SmolStr::new("BTCUSDT")];
        assert_eq!(btc[0].timestamp, 100.0);
        assert_eq!(btc[1].timestamp, 101.0);
        let eth = &grouped[&SmolStr::new("ETHUSDT")];
        assert_eq!(eth.len(), 2);
    }
}
