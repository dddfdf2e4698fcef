//! Name-id backfill: resolve missing numeric ids from listing pages.
//!
//! Runs the same windowed-cursor pattern as the depth sync, on its own
//! checkpoint stream and over the whole catalog (no shards). The id is
//! buried in the listing page's inline script as
//! `Market_LoadOrderSpread( <id> )`.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::constants::{default_name_id_budget, NAME_ID_DELAY_MS};
use crate::error::Result;
use crate::models::{CatalogItem, NameIdTable};
use crate::services::checkpoint::CheckpointStore;
use crate::services::market::MarketClient;

/// Checkpoint stream for the backfill loop.
pub const NAME_ID_STREAM: &str = "name-ids";

static NAME_ID_RE: OnceLock<Regex> = OnceLock::new();

/// Pull the numeric item id out of a listing page, if present.
pub fn extract_name_id(html: &str) -> Option<u64> {
    let re = NAME_ID_RE.get_or_init(|| {
        Regex::new(r"Market_LoadOrderSpread\(\s*(\d+)\s*\)").expect("listing id pattern")
    });
    re.captures(html)?.get(1)?.as_str().parse().ok()
}

/// Seam over the listing endpoint so the loop is testable without a network.
#[async_trait]
pub trait ListingSource {
    async fn fetch_listing_page(&self, hash_name: &str) -> Result<String>;
}

#[async_trait]
impl ListingSource for MarketClient {
    async fn fetch_listing_page(&self, hash_name: &str) -> Result<String> {
        MarketClient::fetch_listing_page(self, hash_name).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NameIdSyncConfig {
    pub budget: usize,
    pub delay: StdDuration,
}

impl Default for NameIdSyncConfig {
    fn default() -> Self {
        Self {
            budget: default_name_id_budget(),
            delay: StdDuration::from_millis(NAME_ID_DELAY_MS),
        }
    }
}

#[derive(Debug, Default)]
pub struct NameIdStats {
    pub resolved: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped_resolved: usize,
    pub skipped_unmarketable: usize,
}

pub struct NameIdSync<'a, S: ListingSource> {
    source: &'a S,
    checkpoints: &'a CheckpointStore,
    config: NameIdSyncConfig,
}

impl<'a, S: ListingSource> NameIdSync<'a, S> {
    pub fn new(source: &'a S, checkpoints: &'a CheckpointStore, config: NameIdSyncConfig) -> Self {
        Self {
            source,
            checkpoints,
            config,
        }
    }

    /// Process one window of the catalog, merging resolved ids into `table`.
    /// The caller writes the table back once the window completes.
    pub async fn run(&self, catalog: &[CatalogItem], table: &mut NameIdTable) -> Result<NameIdStats> {
        let mut stats = NameIdStats::default();

        let len = catalog.len();
        if len == 0 {
            info!("Empty catalog, nothing to do");
            return Ok(stats);
        }

        let mut offset = self.checkpoints.load(NAME_ID_STREAM) as usize;
        if offset >= len {
            warn!(offset, len, "Checkpoint past catalog end, wrapping to 0");
            offset = 0;
            self.checkpoints.save(NAME_ID_STREAM, 0)?;
        }

        let mut upper = (offset + self.config.budget).min(len);
        info!(offset, upper, "Starting name-id window");

        let mut idx = offset;
        while idx < upper {
            self.checkpoints.save(NAME_ID_STREAM, idx as u64)?;
            let item = &catalog[idx];
            let mut did_request = false;

            if table.contains_key(&item.hash_name) {
                stats.skipped_resolved += 1;
                if upper < len {
                    upper += 1;
                }
            } else if item.date_modified.is_none() {
                // Never traded: no listing page to scrape.
                info!(item = %item.hash_name, "Not marketable, skipping");
                stats.skipped_unmarketable += 1;
            } else {
                did_request = true;
                match self.source.fetch_listing_page(&item.hash_name).await {
                    Ok(html) => match extract_name_id(&html) {
                        Some(id) => {
                            info!(item = %item.hash_name, id, "Resolved name id");
                            table.insert(item.hash_name.clone(), id);
                            stats.resolved += 1;
                        }
                        None => {
                            warn!(item = %item.hash_name, "No id marker in listing page");
                            stats.not_found += 1;
                        }
                    },
                    Err(e) => {
                        error!(item = %item.hash_name, error = %e, "Listing fetch failed, continuing");
                        stats.failed += 1;
                    }
                }
            }

            if idx + 1 >= len {
                info!("Reached catalog end, wrapping checkpoint to 0");
                self.checkpoints.save(NAME_ID_STREAM, 0)?;
            } else {
                self.checkpoints.save(NAME_ID_STREAM, (idx + 1) as u64)?;
            }

            idx += 1;
            if did_request && idx < upper {
                sleep(self.config.delay).await;
            }
        }

        info!(
            resolved = stats.resolved,
            not_found = stats.not_found,
            failed = stats.failed,
            "Name-id window complete"
        );
        Ok(stats)
    }
}
