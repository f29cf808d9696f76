//! Newline-delimited JSON backend.
//!
//! `save_all` serialises the full batch into a sibling `.tmp` file and
//! renames it over the target, so readers never observe a half-written
//! snapshot. Loading tolerates individual bad lines; a corrupt tail from an
//! earlier crash should not make the whole history unreadable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::{group_by_symbol, HistoryStore, PersistError, SymbolRecords, TickRecord};

#[derive(Debug, Clone)]
pub struct NdjsonStore {
    path: PathBuf,
}

impl NdjsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl HistoryStore for NdjsonStore {
    async fn save_all(&self, records: &[TickRecord]) -> Result<(), PersistError> {
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, buffer.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<SymbolRecords, PersistError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SymbolRecords::new());
            }
            Err(error) => return Err(error.into()),
        };

        let mut records = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TickRecord>(line) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(path = %self.path.display(), line = number + 1, %error, "skipping bad record");
                }
            }
        }
        Ok(group_by_symbol(records))
    }

    async fn clear(&self) -> Result<(), PersistError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{record, scratch_path};
    use smol_str::SmolStr;

    #[tokio::test]
    async fn test_save_then_load_groups_by_symbol() {
        let store = NdjsonStore::new(scratch_path("ndjson"));
        let records = vec![
            record("BTCUSDT", 1, 100.0, 50_000.0),
            record("ETHUSDT", 1, 100.5, 3_000.0),
            record("BTCUSDT", 2, 101.0, 50_100.0),
        ];

        store.save_all(&records).await.unwrap();
        let loaded = store.load_all().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&SmolStr::new("BTCUSDT")].len(), 2);
        assert_eq!(loaded[&SmolStr::new("BTCUSDT")][1].value, 50_100.0);
        assert_eq!(loaded[&SmolStr::new("ETHUSDT")][0].value, 3_000.0);

        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let store = NdjsonStore::new(scratch_path("ndjson"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_skips_corrupt_lines() {
        let path = scratch_path("ndjson");
        let store = NdjsonStore::new(path.clone());
        store
            .save_all(&[record("BTCUSDT", 1, 100.0, 50_000.0)])
            .await
            .unwrap();

        // Simulate a torn write at the end of the file.
        let mut content = tokio::fs::read_to_string(&path).await.unwrap();
        content.push_str("{\"symbol\":\"ETHUS");
        tokio::fs::write(&path, content).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&SmolStr::new("BTCUSDT")].len(), 1);

        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let store = NdjsonStore::new(scratch_path("ndjson"));
        store
            .save_all(&[record("BTCUSDT", 1, 100.0, 50_000.0)])
            .await
            .unwrap();
        store
            .save_all(&[record("ETHUSDT", 1, 101.0, 3_000.0)])
            .await
            .unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&SmolStr::new("ETHUSDT")));

        store.clear().await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
