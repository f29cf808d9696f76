//! SQLite backend.
//!
//! One `ticks` table with a `(symbol, timestamp)` index, written through a
//! single transaction per `save_all` batch. Inserts are chunked to stay
//! under SQLite's bind-parameter limit.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row};
use tracing::debug;

use crate::{group_by_symbol, HistoryStore, PersistError, SymbolRecords, TickRecord};

// 7 binds per row, comfortably under the 32766 parameter limit.
const INSERT_CHUNK: usize = 1_000;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ticks (
    symbol    TEXT    NOT NULL,
    provider  TEXT    NOT NULL,
    market    TEXT    NOT NULL,
    source    TEXT    NOT NULL,
    sequence  INTEGER NOT NULL,
    timestamp REAL    NOT NULL,
    value     REAL    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ticks_symbol_timestamp ON ticks (symbol, timestamp);
";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and ensure the
    /// schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        // One connection: writes serialise anyway and this keeps in-memory
        // databases coherent for tests.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        debug!(path = %path.as_ref().display(), "sqlite store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn save_all(&self, records: &[TickRecord]) -> Result<(), PersistError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM ticks").execute(&mut *tx).await?;

        for chunk in records.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO ticks (symbol, provider, market, source, sequence, timestamp, value) ",
            );
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.symbol.as_str())
                    .push_bind(record.provider.as_str())
                    .push_bind(record.market.as_str())
                    .push_bind(record.source.as_str())
                    .push_bind(record.sequence as i64)
                    .push_bind(record.timestamp)
                    .push_bind(record.value);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<SymbolRecords, PersistError> {
        let rows = sqlx::query(
            "SELECT symbol, provider, market, source, sequence, timestamp, value \
             FROM ticks ORDER BY symbol, timestamp",
        )
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(|row| {
                Ok(TickRecord {
                    symbol: row.try_get::<String, _>("symbol")?.into(),
                    provider: row.try_get::<String, _>("provider")?.into(),
                    market: row.try_get::<String, _>("market")?.into(),
                    source: row.try_get::<String, _>("source")?.into(),
                    sequence: row.try_get::<i64, _>("sequence")? as u64,
                    timestamp: row.try_get("timestamp")?,
                    value: row.try_get("value")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(group_by_symbol(records))
    }

    async fn clear(&self) -> Result<(), PersistError> {
        sqlx::query("DELETE FROM ticks").execute(&self.pool).await?;
        Ok(())
    }
}
