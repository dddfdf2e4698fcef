use crate::error::Error;
use crate::models::save_name_id_table;
use crate::services::{
    CatalogClient, CheckpointStore, MarketClient, NameIdStats, NameIdSync, NameIdSyncConfig,
};
use crate::utils::{checkpoint_dir, get_data_dir, name_id_table_path};

pub fn run(budget: Option<usize>) {
    println!("🔄 Backfilling item name-ids...");

    match run_backfill(budget) {
        Ok(stats) => {
            println!(
                "\n✅ Window complete: {} resolved, {} without marker, {} failed, {} already known",
                stats.resolved, stats.not_found, stats.failed, stats.skipped_resolved
            );
        }
        Err(e) => {
            eprintln!("\n❌ Name-id backfill failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_backfill(budget: Option<usize>) -> Result<NameIdStats, Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Config(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let data_dir = get_data_dir();
        let table_path = name_id_table_path(&data_dir);

        let catalog_client = CatalogClient::new()?;
        let catalog = catalog_client.fetch_catalog().await?;
        let mut table = catalog_client.fetch_name_id_table(&table_path).await?;

        let market = MarketClient::new()?;
        let checkpoints = CheckpointStore::new(checkpoint_dir(&data_dir));

        let mut config = NameIdSyncConfig::default();
        if let Some(budget) = budget {
            config.budget = budget;
        }

        let sync = NameIdSync::new(&market, &checkpoints, config);
        let stats = sync.run(&catalog, &mut table).await?;

        save_name_id_table(&table_path, &table)?;
        Ok(stats)
    })
}
