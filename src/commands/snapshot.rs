use crate::constants::SHARD_COUNT;
use crate::services::write_snapshot;
use crate::utils::get_data_dir;

pub fn run() {
    let data_dir = get_data_dir();

    match write_snapshot(&data_dir, SHARD_COUNT) {
        Ok(stats) => {
            println!(
                "✅ Snapshot of {} records from {} shards",
                stats.records, stats.shards_read
            );
            println!("   Latest:   {}", stats.latest_path.display());
            println!("   Archived: {}", stats.snapshot_path.display());
        }
        Err(e) => {
            eprintln!("❌ Snapshot failed: {}", e);
            std::process::exit(1);
        }
    }
}
