//! The windowed fetch loop.
//!
//! One invocation processes at most `budget` items of its shard, persisting
//! the checkpoint around every item and the result map after every fetch,
//! so a kill at any point loses at most the in-flight item (which the next
//! run re-fetches; fetches are idempotent). Reaching the catalog's last
//! index wraps the cursor to zero for the next run.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::constants::{default_budget, FRESHNESS_WINDOW_SECS, REQUEST_DELAY_MS};
use crate::error::Result;
use crate::models::{CatalogItem, DepthSnapshot, MarketRecord, NameIdTable};
use crate::services::checkpoint::CheckpointStore;
use crate::services::market::MarketClient;
use crate::services::result_store::ResultStore;

/// Seam over the depth endpoint so the loop is testable without a network.
#[async_trait]
pub trait OrderBookSource {
    async fn fetch_depth(&self, item_nameid: u64) -> Result<Option<DepthSnapshot>>;
}

#[async_trait]
impl OrderBookSource for MarketClient {
    async fn fetch_depth(&self, item_nameid: u64) -> Result<Option<DepthSnapshot>> {
        MarketClient::fetch_depth(self, item_nameid).await
    }
}

/// Half-open catalog index range `[start, end)` owned by one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardBounds {
    pub start: usize,
    pub end: usize,
}

/// Split a catalog of `len` items into `shard_count` contiguous ranges and
/// return the range for the 1-based `shard`. The last shard absorbs the
/// division remainder.
pub fn shard_bounds(len: usize, shard: u32, shard_count: u32) -> ShardBounds {
    let shard = shard.max(1).min(shard_count.max(1));
    let unit = len / shard_count.max(1) as usize;
    let start = (shard as usize - 1) * unit;
    let end = if shard == shard_count {
        len
    } else {
        shard as usize * unit
    };
    ShardBounds { start, end }
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Fetches to attempt this invocation (skips extend the window).
    pub budget: usize,
    /// Fixed delay between depth requests.
    pub delay: StdDuration,
    /// Records fetched within this window are skipped without a request.
    pub freshness_window_secs: i64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            delay: StdDuration::from_millis(REQUEST_DELAY_MS),
            freshness_window_secs: FRESHNESS_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunStats {
    pub fetched: usize,
    pub failed: usize,
    pub skipped_missing_id: usize,
    pub skipped_fresh: usize,
}

impl RunStats {
    pub fn attempted(&self) -> usize {
        self.fetched + self.failed
    }
}

pub struct BatchRunner<'a, S: OrderBookSource> {
    source: &'a S,
    checkpoints: &'a CheckpointStore,
    config: RunnerConfig,
}

impl<'a, S: OrderBookSource> BatchRunner<'a, S> {
    pub fn new(source: &'a S, checkpoints: &'a CheckpointStore, config: RunnerConfig) -> Self {
        Self {
            source,
            checkpoints,
            config,
        }
    }

    /// Process one window of the shard, resuming from the persisted cursor.
    ///
    /// The cursor is shard-relative. It is persisted to the current index
    /// before an item is processed and advanced right after, so progress is
    /// durable per item, not per run.
    pub async fn run(
        &self,
        catalog: &[CatalogItem],
        name_ids: &NameIdTable,
        results: &mut ResultStore,
        stream: &str,
        bounds: ShardBounds,
    ) -> Result<RunStats> {
        let mut stats = RunStats::default();

        let len = catalog.len();
        if len == 0 {
            info!(stream, "Empty catalog, nothing to do");
            return Ok(stats);
        }

        // A shrunk catalog must never index out of bounds.
        let start = bounds.start.min(len);
        let end = bounds.end.min(len);
        let shard_len = end - start;
        if shard_len == 0 {
            info!(stream, "Shard is empty, nothing to do");
            return Ok(stats);
        }

        let mut offset = self.checkpoints.load(stream) as usize;
        if offset >= shard_len {
            warn!(
                stream,
                offset, shard_len, "Checkpoint past shard end, wrapping to shard start"
            );
            offset = 0;
            self.checkpoints.save(stream, 0)?;
        }

        let mut upper = (offset + self.config.budget).min(shard_len);
        info!(
            stream,
            offset,
            upper,
            shard_start = start,
            shard_end = end,
            "Starting window"
        );

        let mut idx = offset;
        while idx < upper {
            let abs = start + idx;
            // Resume at this item if we are killed while processing it.
            self.checkpoints.save(stream, idx as u64)?;

            let item = &catalog[abs];
            let mut did_request = false;

            match name_ids.get(&item.hash_name) {
                None => {
                    info!(item = %item.hash_name, "No name id, skipping");
                    stats.skipped_missing_id += 1;
                    if upper < shard_len {
                        upper += 1;
                    }
                }
                Some(_) if self.is_fresh(results, &item.hash_name) => {
                    info!(item = %item.hash_name, "Already fresh, skipping");
                    stats.skipped_fresh += 1;
                    if upper < shard_len {
                        upper += 1;
                    }
                }
                Some(&item_nameid) => {
                    did_request = true;
                    match self.source.fetch_depth(item_nameid).await {
                        Ok(Some(depth)) => {
                            results.upsert(MarketRecord::from_depth(item, item_nameid, &depth));
                            results.persist()?;
                            stats.fetched += 1;
                            info!(item = %item.hash_name, "Fetched {}/{}", idx + 1, upper);
                        }
                        Ok(None) => {
                            warn!(item = %item.hash_name, "Depth payload missing expected fields, skipping");
                            stats.skipped_missing_id += 1;
                            if upper < shard_len {
                                upper += 1;
                            }
                        }
                        Err(e) => {
                            // One item's exhausted retries must not end the run.
                            error!(item = %item.hash_name, error = %e, "Fetch failed, continuing");
                            stats.failed += 1;
                        }
                    }
                }
            }

            if abs + 1 >= len {
                // Last catalog index: wrap for the next run, regardless of
                // shard bounds.
                info!(stream, "Reached catalog end, wrapping checkpoint to 0");
                self.checkpoints.save(stream, 0)?;
            } else if idx + 1 >= shard_len {
                self.checkpoints.save(stream, 0)?;
            } else {
                self.checkpoints.save(stream, (idx + 1) as u64)?;
            }

            idx += 1;
            if did_request && idx < upper {
                sleep(self.config.delay).await;
            }
        }

        info!(
            stream,
            fetched = stats.fetched,
            failed = stats.failed,
            skipped_missing_id = stats.skipped_missing_id,
            skipped_fresh = stats.skipped_fresh,
            "Window complete"
        );
        Ok(stats)
    }

    fn is_fresh(&self, results: &ResultStore, hash_name: &str) -> bool {
        let Some(existing) = results.get(hash_name) else {
            return false;
        };
        let age_ms = Utc::now().timestamp_millis() - existing.date_modified;
        age_ms < self.config.freshness_window_secs * 1_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct MockSource {
        depths: HashMap<u64, DepthSnapshot>,
        fail_ids: HashSet<u64>,
        calls: Mutex<Vec<u64>>,
    }

    impl MockSource {
        fn new(ids: &[u64]) -> Self {
            let depths = ids
                .iter()
                .map(|&id| {
                    (
                        id,
                        DepthSnapshot {
                            sell_order_count: 10,
                            buy_order_count: 5,
                            lowest_sell_order: 1000 + id as i64,
                            highest_buy_order: 900 + id as i64,
                        },
                    )
                })
                .collect();
            Self {
                depths,
                fail_ids: HashSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl OrderBookSource for MockSource {
        async fn fetch_depth(&self, item_nameid: u64) -> Result<Option<DepthSnapshot>> {
            self.calls.lock().unwrap().push(item_nameid);
            if self.fail_ids.contains(&item_nameid) {
                return Err(crate::error::Error::FetchFailed("boom".to_string()));
            }
            Ok(self.depths.get(&item_nameid).copied())
        }
    }

    fn catalog(n: usize) -> Vec<CatalogItem> {
        (0..n)
            .map(|i| CatalogItem {
                hash_name: format!("item-{}", i),
                image: None,
                date_modified: Some(1),
            })
            .collect()
    }

    fn name_table(n: usize) -> NameIdTable {
        (0..n)
            .map(|i| (format!("item-{}", i), 100 + i as u64))
            .collect()
    }

    fn test_config(budget: usize) -> RunnerConfig {
        RunnerConfig {
            budget,
            delay: StdDuration::ZERO,
            freshness_window_secs: FRESHNESS_WINDOW_SECS,
        }
    }

    fn fixture(dir: &TempDir) -> (CheckpointStore, ResultStore) {
        (
            CheckpointStore::new(dir.path().join("checkpoints")),
            ResultStore::load(dir.path().join("items.json")),
        )
    }

    #[tokio::test]
    async fn test_window_processes_tail_and_wraps() {
        // Catalog [0..5), budget 2, checkpoint at 3: processes indices 3 and
        // 4; index 4 is the last, so the checkpoint wraps to 0.
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let ids: Vec<u64> = (0..5).map(|i| 100 + i).collect();
        let source = MockSource::new(&ids);
        checkpoints.save("shard-1", 3).unwrap();

        let runner = BatchRunner::new(&source, &checkpoints, test_config(2));
        let stats = runner
            .run(
                &catalog(5),
                &name_table(5),
                &mut results,
                "shard-1",
                ShardBounds { start: 0, end: 5 },
            )
            .await
            .unwrap();

        assert_eq!(stats.fetched, 2);
        assert_eq!(checkpoints.load("shard-1"), 0);
        assert!(results.get("item-3").is_some());
        assert!(results.get("item-4").is_some());
        assert!(results.get("item-2").is_none());
    }

    #[tokio::test]
    async fn test_empty_catalog_is_noop() {
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let source = MockSource::new(&[]);

        let runner = BatchRunner::new(&source, &checkpoints, test_config(2));
        let stats = runner
            .run(
                &[],
                &NameIdTable::new(),
                &mut results,
                "shard-1",
                ShardBounds { start: 0, end: 0 },
            )
            .await
            .unwrap();

        assert_eq!(stats.attempted(), 0);
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_checkpoint_wraps_to_shard_start() {
        // Catalog shrank below the stored cursor: restart at the shard
        // start instead of indexing out of bounds.
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let ids: Vec<u64> = (0..3).map(|i| 100 + i).collect();
        let source = MockSource::new(&ids);
        checkpoints.save("shard-1", 10).unwrap();

        let runner = BatchRunner::new(&source, &checkpoints, test_config(2));
        let stats = runner
            .run(
                &catalog(3),
                &name_table(3),
                &mut results,
                "shard-1",
                ShardBounds { start: 0, end: 3 },
            )
            .await
            .unwrap();

        assert_eq!(stats.fetched, 2);
        assert!(results.get("item-0").is_some());
        assert!(results.get("item-1").is_some());
        assert_eq!(checkpoints.load("shard-1"), 2);
    }

    #[tokio::test]
    async fn test_missing_name_id_extends_window() {
        // item-1 has no id: the skip does not count against the budget, so
        // the run still fetches two items.
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let source = MockSource::new(&[100, 102, 103, 104]);
        let mut table = name_table(5);
        table.remove("item-1");

        let runner = BatchRunner::new(&source, &checkpoints, test_config(2));
        let stats = runner
            .run(
                &catalog(5),
                &table,
                &mut results,
                "shard-1",
                ShardBounds { start: 0, end: 5 },
            )
            .await
            .unwrap();

        assert_eq!(stats.fetched, 2);
        assert_eq!(stats.skipped_missing_id, 1);
        assert!(results.get("item-0").is_some());
        assert!(results.get("item-2").is_some());
        assert_eq!(checkpoints.load("shard-1"), 3);
    }

    #[tokio::test]
    async fn test_fresh_record_skipped_without_request() {
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let ids: Vec<u64> = (0..3).map(|i| 100 + i).collect();
        let source = MockSource::new(&ids);

        // item-0 was fetched moments ago.
        results.upsert(MarketRecord {
            hash_name: "item-0".to_string(),
            item_nameid: 100,
            image: None,
            sell_order_count: 1,
            buy_order_count: 1,
            lowest_sell_order: "1.00".to_string(),
            highest_buy_order: "0.90".to_string(),
            date_modified: Utc::now().timestamp_millis(),
        });

        let runner = BatchRunner::new(&source, &checkpoints, test_config(1));
        let stats = runner
            .run(
                &catalog(3),
                &name_table(3),
                &mut results,
                "shard-1",
                ShardBounds { start: 0, end: 3 },
            )
            .await
            .unwrap();

        assert_eq!(stats.skipped_fresh, 1);
        assert_eq!(stats.fetched, 1);
        // Only item-1 hit the network.
        assert_eq!(source.call_count(), 1);
        assert_eq!(source.calls.lock().unwrap()[0], 101);
    }

    #[tokio::test]
    async fn test_stale_record_is_refetched() {
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let source = MockSource::new(&[100]);

        results.upsert(MarketRecord {
            hash_name: "item-0".to_string(),
            item_nameid: 100,
            image: None,
            sell_order_count: 1,
            buy_order_count: 1,
            lowest_sell_order: "1.00".to_string(),
            highest_buy_order: "0.90".to_string(),
            date_modified: Utc::now().timestamp_millis() - FRESHNESS_WINDOW_SECS * 10_000,
        });

        let runner = BatchRunner::new(&source, &checkpoints, test_config(1));
        let stats = runner
            .run(
                &catalog(1),
                &name_table(1),
                &mut results,
                "shard-1",
                ShardBounds { start: 0, end: 1 },
            )
            .await
            .unwrap();

        assert_eq!(stats.fetched, 1);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_consumes_budget_and_continues() {
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let mut source = MockSource::new(&[100, 101]);
        source.fail_ids.insert(100);

        let runner = BatchRunner::new(&source, &checkpoints, test_config(2));
        let stats = runner
            .run(
                &catalog(2),
                &name_table(2),
                &mut results,
                "shard-1",
                ShardBounds { start: 0, end: 2 },
            )
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.fetched, 1);
        assert!(results.get("item-0").is_none());
        assert!(results.get("item-1").is_some());
    }

    #[tokio::test]
    async fn test_shard_bounds_offset_into_catalog() {
        // Shard 2 of 2 over 10 items owns [5, 10); its checkpoint is
        // shard-relative.
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let ids: Vec<u64> = (0..10).map(|i| 100 + i).collect();
        let source = MockSource::new(&ids);

        let bounds = shard_bounds(10, 2, 2);
        assert_eq!(bounds, ShardBounds { start: 5, end: 10 });

        let runner = BatchRunner::new(&source, &checkpoints, test_config(3));
        let stats = runner
            .run(&catalog(10), &name_table(10), &mut results, "shard-2", bounds)
            .await
            .unwrap();

        assert_eq!(stats.fetched, 3);
        assert!(results.get("item-5").is_some());
        assert!(results.get("item-7").is_some());
        assert!(results.get("item-4").is_none());
        assert_eq!(checkpoints.load("shard-2"), 3);
    }

    #[tokio::test]
    async fn test_shard_end_wraps_checkpoint_mid_catalog() {
        // Shard 1 of 2 exhausts its range [0, 5): the cursor wraps to 0 even
        // though the catalog itself continues.
        let dir = TempDir::new().unwrap();
        let (checkpoints, mut results) = fixture(&dir);
        let ids: Vec<u64> = (0..10).map(|i| 100 + i).collect();
        let source = MockSource::new(&ids);
        checkpoints.save("shard-1", 3).unwrap();

        let runner = BatchRunner::new(&source, &checkpoints, test_config(5));
        let stats = runner
            .run(
                &catalog(10),
                &name_table(10),
                &mut results,
                "shard-1",
                shard_bounds(10, 1, 2),
            )
            .await
            .unwrap();

        assert_eq!(stats.fetched, 2);
        assert_eq!(checkpoints.load("shard-1"), 0);
    }

    #[tokio::test]
    async fn test_results_persisted_after_each_fetch() {
        let dir = TempDir::new().unwrap();
        let checkpoints = CheckpointStore::new(dir.path().join("checkpoints"));
        let results_path = dir.path().join("items.json");
        let mut results = ResultStore::load(&results_path);
        let source = MockSource::new(&[100, 101]);

        let runner = BatchRunner::new(&source, &checkpoints, test_config(2));
        runner
            .run(
                &catalog(2),
                &name_table(2),
                &mut results,
                "shard-1",
                ShardBounds { start: 0, end: 2 },
            )
            .await
            .unwrap();

        // A fresh load from disk sees both records.
        let reloaded = ResultStore::load(&results_path);
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_shard_bounds_split() {
        assert_eq!(shard_bounds(100, 1, 8), ShardBounds { start: 0, end: 12 });
        assert_eq!(shard_bounds(100, 7, 8), ShardBounds { start: 72, end: 84 });
        // Last shard absorbs the remainder.
        assert_eq!(shard_bounds(100, 8, 8), ShardBounds { start: 84, end: 100 });
        // Whole catalog when unsharded.
        assert_eq!(shard_bounds(5, 1, 1), ShardBounds { start: 0, end: 5 });
    }

    #[test]
    fn test_shard_bounds_tiny_catalog() {
        // Fewer items than shards: early shards are empty, the last one
        // covers everything.
        assert_eq!(shard_bounds(5, 1, 8), ShardBounds { start: 0, end: 0 });
        assert_eq!(shard_bounds(5, 8, 8), ShardBounds { start: 0, end: 5 });
    }
}
