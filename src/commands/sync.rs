use std::time::Duration;

use crate::constants::{default_budget, FRESHNESS_WINDOW_SECS, REQUEST_DELAY_MS, SHARD_COUNT};
use crate::error::Error;
use crate::services::{
    shard_bounds, BatchRunner, CatalogClient, CheckpointStore, MarketClient, ResultStore,
    RunStats, RunnerConfig,
};
use crate::utils::{checkpoint_dir, env_shard, get_data_dir, name_id_table_path, shard_result_path};

pub fn run(shard: Option<u32>, budget: Option<usize>, delay_ms: Option<u64>) {
    let shard = shard.or_else(env_shard).unwrap_or(1);
    if shard == 0 || shard > SHARD_COUNT {
        eprintln!("❌ Invalid shard {} (valid: 1..={})", shard, SHARD_COUNT);
        std::process::exit(1);
    }

    println!("🔄 Syncing shard {}/{}...", shard, SHARD_COUNT);

    match run_sync(shard, budget, delay_ms) {
        Ok(stats) => {
            println!(
                "\n✅ Window complete: {} fetched, {} failed, {} skipped (no id), {} skipped (fresh)",
                stats.fetched, stats.failed, stats.skipped_missing_id, stats.skipped_fresh
            );
        }
        Err(e) => {
            eprintln!("\n❌ Sync failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_sync(shard: u32, budget: Option<usize>, delay_ms: Option<u64>) -> Result<RunStats, Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Config(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let data_dir = get_data_dir();

        let catalog_client = CatalogClient::new()?;
        let catalog = catalog_client.fetch_catalog().await?;
        let name_ids = catalog_client
            .fetch_name_id_table(&name_id_table_path(&data_dir))
            .await?;

        let market = MarketClient::new()?;
        let checkpoints = CheckpointStore::new(checkpoint_dir(&data_dir));
        let mut results = ResultStore::load(shard_result_path(&data_dir, shard));

        let config = RunnerConfig {
            budget: budget.unwrap_or(default_budget()),
            delay: Duration::from_millis(delay_ms.unwrap_or(REQUEST_DELAY_MS)),
            freshness_window_secs: FRESHNESS_WINDOW_SECS,
        };

        let stream = format!("shard-{}", shard);
        let bounds = shard_bounds(catalog.len(), shard, SHARD_COUNT);
        let runner = BatchRunner::new(&market, &checkpoints, config);
        runner
            .run(&catalog, &name_ids, &mut results, &stream, bounds)
            .await
    })
}
