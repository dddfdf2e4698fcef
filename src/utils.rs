use std::path::PathBuf;

/// Get the data directory from the environment or use the default.
pub fn get_data_dir() -> PathBuf {
    std::env::var("MARKET_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Directory holding one checkpoint file per stream.
pub fn checkpoint_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("checkpoints")
}

/// Root directory the merge step scans for shard outputs.
pub fn shards_root(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("shards")
}

/// Output directory for one shard invocation.
pub fn shard_dir(data_dir: &std::path::Path, shard: u32) -> PathBuf {
    shards_root(data_dir).join(format!("shard-{}", shard))
}

/// Result file a shard invocation rewrites after every fetch.
pub fn shard_result_path(data_dir: &std::path::Path, shard: u32) -> PathBuf {
    shard_dir(data_dir, shard).join("items.json")
}

/// The canonical merged dataset.
pub fn canonical_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("items.json")
}

/// Local backup of the identity -> numeric id table.
pub fn name_id_table_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("name_ids.json")
}

/// Latest concatenated price snapshot.
pub fn latest_snapshot_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("prices_latest.json")
}

/// Directory of timestamped price snapshots.
pub fn snapshots_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("snapshots")
}

/// Shard number from the environment (set by the scheduler), if any.
pub fn env_shard() -> Option<u32> {
    std::env::var("BATCH_NUM").ok().and_then(|v| v.parse().ok())
}

/// Percent-encode a string for use as a URL path or query component.
///
/// Unreserved characters (RFC 3986) pass through; everything else is encoded
/// byte-wise. Item names contain spaces, pipes, and non-ASCII symbols.
pub fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
