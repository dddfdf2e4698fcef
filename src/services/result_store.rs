//! Shard result accumulator: identity -> record, rewritten in full after
//! every successful fetch so partial progress survives a kill.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::models::{MarketRecord, ResultMap};

pub struct ResultStore {
    path: PathBuf,
    records: ResultMap,
}

impl ResultStore {
    /// Load existing results from disk. A missing or malformed file starts
    /// an empty map (logged); the next persist overwrites it.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        let records = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<MarketRecord>>(&contents) {
                Ok(list) => list
                    .into_iter()
                    .map(|r| (r.hash_name.clone(), r))
                    .collect(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed result file, starting empty");
                    ResultMap::new()
                }
            },
            Err(_) => ResultMap::new(),
        };

        Self { path, records }
    }

    /// Replace the record for its identity (last write wins, whole record).
    pub fn upsert(&mut self, record: MarketRecord) {
        self.records.insert(record.hash_name.clone(), record);
    }

    pub fn get(&self, hash_name: &str) -> Option<&MarketRecord> {
        self.records.get(hash_name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the full map to disk as a JSON array. Keyed by a BTreeMap, so
    /// the array order is stable across runs.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let values: Vec<&MarketRecord> = self.records.values().collect();
        let contents = serde_json::to_string_pretty(&values)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, nameid: u64) -> MarketRecord {
        MarketRecord {
            hash_name: name.to_string(),
            item_nameid: nameid,
            image: None,
            sell_order_count: 1,
            buy_order_count: 2,
            lowest_sell_order: "1.00".to_string(),
            highest_buy_order: "0.90".to_string(),
            date_modified: 1_718_000_000_000,
        }
    }

    #[test]
    fn test_load_missing_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::load(dir.path().join("items.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_persist_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.json");

        let mut store = ResultStore::load(&path);
        store.upsert(record("b-item", 2));
        store.upsert(record("a-item", 1));
        store.persist().unwrap();

        let reloaded = ResultStore::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("a-item").unwrap().item_nameid, 1);
    }

    #[test]
    fn test_upsert_replaces_whole_record() {
        let dir = TempDir::new().unwrap();
        let mut store = ResultStore::load(dir.path().join("items.json"));

        store.upsert(record("item", 1));
        let mut newer = record("item", 1);
        newer.sell_order_count = 99;
        store.upsert(newer);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("item").unwrap().sell_order_count, 99);
    }

    #[test]
    fn test_malformed_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.json");
        fs::write(&path, "[{broken").unwrap();

        let store = ResultStore::load(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_persist_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path_a = dir.path().join("a.json");
        let path_b = dir.path().join("b.json");

        let mut a = ResultStore::load(&path_a);
        a.upsert(record("z", 26));
        a.upsert(record("a", 1));
        a.persist().unwrap();

        // Same records inserted in the opposite order.
        let mut b = ResultStore::load(&path_b);
        b.upsert(record("a", 1));
        b.upsert(record("z", 26));
        b.persist().unwrap();

        assert_eq!(
            fs::read_to_string(&path_a).unwrap(),
            fs::read_to_string(&path_b).unwrap()
        );
    }
}
