//! Tuning constants for the sync loop, retry policy, and merge step.
//!
//! The upstream marketplace throttles aggressively, so the defaults here are
//! deliberately conservative: one request every few seconds, long backoff
//! after a failure. A single invocation is sized to finish well inside a
//! scheduler window (`RUN_WINDOW_SECS`), and the item budget per run is
//! derived from that window and the inter-request delay.

/// Wall-clock budget for one sync invocation, in seconds.
pub const RUN_WINDOW_SECS: u64 = 20;

/// Fixed delay between depth requests, in milliseconds.
pub const REQUEST_DELAY_MS: u64 = 8_000;

/// Wall-clock budget for one name-id backfill invocation, in seconds.
pub const NAME_ID_RUN_WINDOW_SECS: u64 = 30;

/// Fixed delay between listing-page requests, in milliseconds.
pub const NAME_ID_DELAY_MS: u64 = 5_000;

/// First retry waits this long; each further attempt doubles it.
pub const RETRY_BASE_DELAY_MS: u64 = 30_000;

/// Backoff delays never exceed this, regardless of attempt count.
pub const RETRY_MAX_DELAY_SECS: u64 = 120;

/// Attempt ceiling for a single item fetch.
pub const MAX_RETRIES: u32 = 5;

/// Number of parallel shard invocations the catalog is split across.
/// Shard disjointness is the scheduler's job; this only sizes the split.
pub const SHARD_COUNT: u32 = 8;

/// A merge that yields fewer records than this refuses to overwrite the
/// canonical dataset.
pub const MIN_MERGE_RECORDS: usize = 100;

/// Records fetched within this many seconds are considered fresh and are
/// skipped without a network call.
pub const FRESHNESS_WINDOW_SECS: i64 = 300;

/// HTTP request timeout, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Marketplace web endpoint root.
pub const MARKET_BASE_URL: &str = "https://steamcommunity.com/market";

/// App id of the game whose items are tracked.
pub const GAME_ID: u32 = 730;

/// Remote catalog of known items (identity, image, tradeable marker).
pub const CATALOG_URL: &str =
    "https://raw.githubusercontent.com/Kastuks/market-information/refs/heads/main/data/cs2_items.json";

/// Community-maintained identity -> numeric id table.
pub const NAME_ID_TABLE_URL: &str =
    "https://raw.githubusercontent.com/somespecialone/steam-item-name-ids/refs/heads/master/data/cs2.json";

/// FX rate endpoint for the USD -> EUR conversion used by price overviews.
pub const FX_RATES_URL: &str = "https://api.fxratesapi.com/latest";

/// Fallback conversion rate when the FX endpoint is unreachable.
pub const DEFAULT_USD_TO_EUR: f64 = 0.9;

/// Items a single sync invocation will attempt, derived from the run window
/// and the inter-request delay.
pub const fn default_budget() -> usize {
    (RUN_WINDOW_SECS * 1_000 / REQUEST_DELAY_MS) as usize
}

/// Items a single name-id invocation will attempt.
pub const fn default_name_id_budget() -> usize {
    (NAME_ID_RUN_WINDOW_SECS * 1_000 / NAME_ID_DELAY_MS) as usize
}
