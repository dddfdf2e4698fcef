//! Durable integer cursor, one file per logical stream.
//!
//! A stream is either a shard (`shard-3`) or an independent loop
//! (`name-ids`). The store never surfaces a read error: an absent,
//! malformed, or negative file self-heals to position 0, which only costs
//! redundant idempotent re-fetches.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Serialize, Deserialize)]
struct StartFrom {
    start_from: i64,
}

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("start_from_{}.json", stream))
    }

    /// Load the cursor for a stream. Absent, malformed, or negative values
    /// reset to 0 (and the healed value is persisted).
    pub fn load(&self, stream: &str) -> u64 {
        let path = self.path(stream);

        let position = fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str::<StartFrom>(&contents).ok())
            .map(|sf| sf.start_from);

        match position {
            Some(p) if p >= 0 => p as u64,
            Some(p) => {
                warn!(stream, position = p, "Negative checkpoint, resetting to 0");
                self.heal(stream);
                0
            }
            None => {
                if path.exists() {
                    warn!(stream, "Malformed checkpoint file, resetting to 0");
                }
                self.heal(stream);
                0
            }
        }
    }

    /// Read the cursor without healing. For reporting only; the sync loops
    /// use `load`.
    pub fn peek(&self, stream: &str) -> Option<u64> {
        let contents = fs::read_to_string(self.path(stream)).ok()?;
        let sf: StartFrom = serde_json::from_str(&contents).ok()?;
        u64::try_from(sf.start_from).ok()
    }

    /// Persist the cursor (full-file overwrite).
    pub fn save(&self, stream: &str, position: u64) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(&StartFrom {
            start_from: position as i64,
        })?;
        fs::write(self.path(stream), contents)?;
        Ok(())
    }

    fn heal(&self, stream: &str) {
        if let Err(e) = self.save(stream, 0) {
            warn!(stream, error = %e, "Failed to persist healed checkpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_zero_and_heals() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());

        assert_eq!(store.load("shard-1"), 0);
        // Healed file is now on disk with position 0.
        assert!(dir.path().join("start_from_shard-1.json").exists());
        assert_eq!(store.load("shard-1"), 0);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());

        store.save("shard-2", 41).unwrap();
        assert_eq!(store.load("shard-2"), 41);
    }

    #[test]
    fn test_malformed_file_heals_to_zero() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());

        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("start_from_shard-1.json"), "{not json").unwrap();

        assert_eq!(store.load("shard-1"), 0);
        // Self-healed: a later load parses cleanly.
        assert_eq!(store.load("shard-1"), 0);
    }

    #[test]
    fn test_negative_value_heals_to_zero() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());

        fs::write(
            dir.path().join("start_from_name-ids.json"),
            r#"{"start_from": -5}"#,
        )
        .unwrap();

        assert_eq!(store.load("name-ids"), 0);
    }

    #[test]
    fn test_streams_are_independent() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());

        store.save("shard-1", 10).unwrap();
        store.save("shard-2", 20).unwrap();

        assert_eq!(store.load("shard-1"), 10);
        assert_eq!(store.load("shard-2"), 20);
    }
}
