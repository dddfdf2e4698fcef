mod catalog;
mod record;

pub use catalog::{load_name_id_table, save_name_id_table, CatalogItem, NameIdTable};
pub use record::{DepthSnapshot, MarketRecord, PriceOverview};

use std::collections::BTreeMap;

/// Accumulated fetch results for one shard (identity -> record).
pub type ResultMap = BTreeMap<String, MarketRecord>;
