use crate::constants::SHARD_COUNT;
use crate::services::{CheckpointStore, ResultStore, NAME_ID_STREAM};
use crate::utils::{canonical_path, checkpoint_dir, get_data_dir, shard_result_path};

pub fn run() {
    let data_dir = get_data_dir();
    let checkpoints = CheckpointStore::new(checkpoint_dir(&data_dir));

    println!("📊 Sync Status\n");
    println!("   Data directory: {}\n", data_dir.display());

    let mut total_records = 0;
    for shard in 1..=SHARD_COUNT {
        let stream = format!("shard-{}", shard);
        let cursor = checkpoints
            .peek(&stream)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());

        let path = shard_result_path(&data_dir, shard);
        let records = if path.exists() {
            ResultStore::load(&path).len()
        } else {
            0
        };
        total_records += records;

        println!("   Shard {}: cursor {:>6}  {:>7} records", shard, cursor, records);
    }

    println!("\n   Total shard records: {}", total_records);

    if let Some(cursor) = checkpoints.peek(NAME_ID_STREAM) {
        println!("   Name-id cursor: {}", cursor);
    }

    let canonical = canonical_path(&data_dir);
    if canonical.exists() {
        let records = ResultStore::load(&canonical).len();
        println!("   Canonical dataset: {} records ({})", records, canonical.display());
    } else {
        println!("   Canonical dataset: not yet merged");
    }
}
