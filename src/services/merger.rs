//! Offline shard merge: fold every shard output (plus any previous
//! canonical dataset) into one deduplicated map, newest record per key.
//!
//! The merge is a derived projection, rebuilt from scratch each time; it is
//! never the owner of the data. The one hard failure is the minimum-size
//! guard: a suspiciously small result must not clobber a good canonical
//! file.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::MIN_MERGE_RECORDS;
use crate::error::{Error, Result};

/// Which record field keys the canonical dataset. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKey {
    /// The item's stable name identity (`hash_name`).
    Identity,
    /// The externally-assigned numeric id (`item_nameid`).
    ExternalId,
}

impl MergeKey {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s {
            "identity" => Ok(MergeKey::Identity),
            "external-id" => Ok(MergeKey::ExternalId),
            _ => Err(format!(
                "Invalid merge key: {}. Valid options: identity, external-id",
                s
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Immediate subdirectories of the artifact root whose name starts with
    /// this prefix are treated as shard outputs.
    pub shard_prefix: String,
    /// Files inside a shard directory with this extension are part files.
    pub part_suffix: String,
    /// Refuse to write a canonical dataset smaller than this.
    pub min_records: usize,
    pub key: MergeKey,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            shard_prefix: "shard".to_string(),
            part_suffix: ".json".to_string(),
            min_records: MIN_MERGE_RECORDS,
            key: MergeKey::Identity,
        }
    }
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub records: usize,
    pub parts_merged: usize,
    pub parts_skipped: usize,
}

/// Merge all shard parts under `artifact_root` (seeded from `canonical_path`
/// if readable) and overwrite `canonical_path` with the result.
///
/// Shard directories and part files are folded in name order, so the merge
/// is reproducible: for fixed inputs, the output is byte-identical across
/// runs. Ties across shards go to the later-sorted shard, which must hold
/// genuinely newer data; disjoint key ownership is the scheduler's
/// guarantee, not checked here.
pub fn merge(artifact_root: &Path, canonical_path: &Path, config: &MergeConfig) -> Result<MergeOutcome> {
    let mut accumulator: BTreeMap<String, Value> = BTreeMap::new();
    let mut outcome = MergeOutcome::default();

    // Seed from the previous canonical dataset; a malformed file is not
    // fatal here, the merge just starts empty.
    if canonical_path.exists() {
        match fs::read_to_string(canonical_path)
            .map_err(|e| e.to_string())
            .and_then(|c| serde_json::from_str::<Value>(&c).map_err(|e| e.to_string()))
        {
            Ok(existing) => fold_payload(&mut accumulator, existing, config.key),
            Err(e) => {
                warn!(path = %canonical_path.display(), error = %e, "Existing canonical dataset unreadable, merging from scratch");
            }
        }
    }

    for part in enumerate_parts(artifact_root, config)? {
        match fs::read_to_string(&part)
            .map_err(|e| e.to_string())
            .and_then(|c| serde_json::from_str::<Value>(&c).map_err(|e| e.to_string()))
        {
            Ok(payload) => {
                fold_payload(&mut accumulator, payload, config.key);
                outcome.parts_merged += 1;
            }
            Err(e) => {
                warn!(path = %part.display(), error = %e, "Failed to parse shard part, skipping");
                outcome.parts_skipped += 1;
            }
        }
    }

    if accumulator.len() < config.min_records {
        return Err(Error::MergeTooSmall {
            got: accumulator.len(),
            min: config.min_records,
        });
    }

    let values: Vec<&Value> = accumulator.values().collect();
    let contents = serde_json::to_string_pretty(&values)?;
    if let Some(parent) = canonical_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(canonical_path, contents)?;

    outcome.records = accumulator.len();
    info!(
        records = outcome.records,
        parts_merged = outcome.parts_merged,
        parts_skipped = outcome.parts_skipped,
        "Canonical dataset written"
    );
    Ok(outcome)
}

/// Shard part files under the artifact root, in deterministic order:
/// shard directories sorted by name, part files sorted by name within each.
fn enumerate_parts(artifact_root: &Path, config: &MergeConfig) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(artifact_root).map_err(|e| {
        Error::NotFound(format!(
            "artifact directory {}: {}",
            artifact_root.display(),
            e
        ))
    })?;

    let mut shard_dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(&config.shard_prefix)
        })
        .map(|e| e.path())
        .collect();
    shard_dirs.sort();

    let mut parts = Vec::new();
    for dir in shard_dirs {
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().ends_with(&config.part_suffix))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        parts.extend(files);
    }
    Ok(parts)
}

/// Normalize a part payload to a record sequence (a bare object is a
/// one-element sequence) and fold it into the accumulator. Records without
/// a usable key are dropped.
fn fold_payload(accumulator: &mut BTreeMap<String, Value>, payload: Value, key: MergeKey) {
    match payload {
        Value::Array(records) => {
            for record in records {
                fold_record(accumulator, record, key);
            }
        }
        other => fold_record(accumulator, other, key),
    }
}

fn fold_record(accumulator: &mut BTreeMap<String, Value>, record: Value, key: MergeKey) {
    if let Some(k) = record_key(&record, key) {
        accumulator.insert(k, record);
    }
}

fn record_key(record: &Value, key: MergeKey) -> Option<String> {
    match key {
        MergeKey::Identity => record
            .get("hash_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        MergeKey::ExternalId => match record.get("item_nameid")? {
            Value::Number(n) => n.as_u64().map(|v| v.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        },
    }
}
