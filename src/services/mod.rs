pub mod catalog;
pub mod checkpoint;
pub mod fx;
pub mod market;
pub mod merger;
pub mod name_ids;
pub mod result_store;
pub mod runner;
pub mod snapshot;

pub use catalog::CatalogClient;
pub use checkpoint::CheckpointStore;
pub use fx::{fetch_usd_to_eur, PriceFormatter};
pub use market::MarketClient;
pub use merger::{merge, MergeConfig, MergeKey, MergeOutcome};
pub use name_ids::{extract_name_id, NameIdSync, NameIdSyncConfig, NameIdStats, NAME_ID_STREAM};
pub use result_store::ResultStore;
pub use runner::{shard_bounds, BatchRunner, OrderBookSource, RunStats, RunnerConfig, ShardBounds};
pub use snapshot::{write_snapshot, SnapshotStats};
