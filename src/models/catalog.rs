//! Catalog item model and the identity -> numeric id lookup table.
//!
//! The catalog is an ordered list; item order defines checkpoint positions,
//! so it is treated as append-mostly. The lookup table may be stale or
//! missing entries for new items; the name-id backfill fills the gaps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// One entry of the item catalog.
///
/// `date_modified` doubles as the tradeable marker: items that have never
/// been seen on the market carry no timestamp and are skipped by the
/// name-id backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub hash_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<i64>,
}

/// Identity -> externally-assigned numeric id.
///
/// BTreeMap so the serialized backup file is stable across writes.
pub type NameIdTable = BTreeMap<String, u64>;

/// Load the local name-id table backup.
pub fn load_name_id_table<P: AsRef<Path>>(path: P) -> Result<NameIdTable> {
    let contents = fs::read_to_string(&path).map_err(|e| {
        Error::NotFound(format!(
            "name-id table {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    let table: NameIdTable = serde_json::from_str(&contents)?;
    Ok(table)
}

/// Write the name-id table backup (full overwrite).
pub fn save_name_id_table<P: AsRef<Path>>(path: P, table: &NameIdTable) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(table)?;
    fs::write(path, contents)?;
    Ok(())
}
