//! Price snapshot: concatenate shard outputs into a "latest" file plus a
//! timestamped copy. No deduplication here, that is the merge step's job;
//! snapshots preserve exactly what the shards hold at this moment.

use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::utils::{latest_snapshot_path, shard_result_path, snapshots_dir};

#[derive(Debug)]
pub struct SnapshotStats {
    pub records: usize,
    pub shards_read: usize,
    pub latest_path: PathBuf,
    pub snapshot_path: PathBuf,
}

/// Concatenate shard files `1..=shard_count` (missing shards are fine) and
/// write both snapshot files.
pub fn write_snapshot(data_dir: &Path, shard_count: u32) -> Result<SnapshotStats> {
    let mut all_records: Vec<Value> = Vec::new();
    let mut shards_read = 0;

    for shard in 1..=shard_count {
        let path = shard_result_path(data_dir, shard);
        if !path.exists() {
            continue;
        }
        match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|c| serde_json::from_str::<Vec<Value>>(&c).map_err(|e| e.to_string()))
        {
            Ok(records) => {
                all_records.extend(records);
                shards_read += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable shard file, skipping");
            }
        }
    }

    let contents = serde_json::to_string_pretty(&all_records)?;

    let latest_path = latest_snapshot_path(data_dir);
    fs::create_dir_all(data_dir)?;
    fs::write(&latest_path, &contents)?;

    let dir = snapshots_dir(data_dir);
    fs::create_dir_all(&dir)?;
    let timestamp = Utc::now().format("%Y-%m-%dT%H_%M_%S");
    let snapshot_path = dir.join(format!("price_snapshot_{}.json", timestamp));
    fs::write(&snapshot_path, &contents)?;

    info!(
        records = all_records.len(),
        shards_read,
        latest = %latest_path.display(),
        "Snapshot written"
    );

    Ok(SnapshotStats {
        records: all_records.len(),
        shards_read,
        latest_path,
        snapshot_path,
    })
}
