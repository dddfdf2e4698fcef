use std::path::PathBuf;

use crate::services::{merge, MergeConfig, MergeKey};
use crate::utils::{canonical_path, get_data_dir};

pub fn run(dir: PathBuf, output: Option<PathBuf>, key: String, min_records: Option<usize>) {
    let key = match MergeKey::parse(&key) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let output = output.unwrap_or_else(|| canonical_path(&get_data_dir()));
    let mut config = MergeConfig {
        key,
        ..MergeConfig::default()
    };
    if let Some(min_records) = min_records {
        config.min_records = min_records;
    }

    println!("🔀 Merging shard outputs from {}...", dir.display());

    match merge(&dir, &output, &config) {
        Ok(outcome) => {
            println!(
                "✅ Wrote {} records to {} ({} parts merged, {} skipped)",
                outcome.records,
                output.display(),
                outcome.parts_merged,
                outcome.parts_skipped
            );
        }
        Err(e) => {
            eprintln!("❌ Merge failed: {}", e);
            std::process::exit(1);
        }
    }
}
