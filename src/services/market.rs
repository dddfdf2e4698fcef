//! Marketplace HTTP client: one request per attempt, exponential backoff
//! with jitter up to a fixed retry ceiling, optional proxy rotation.
//!
//! The client pool holds a direct connection plus one client per proxy
//! listed in the `HTTP_PROXIES` env var (comma-separated). Attempts rotate
//! through the pool so a throttled egress path does not stall a whole run.

use isahc::{config::Configurable, prelude::*, HttpClient};
use serde_json::Value;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::constants::{
    GAME_ID, HTTP_TIMEOUT_SECS, MARKET_BASE_URL, MAX_RETRIES, RETRY_BASE_DELAY_MS,
    RETRY_MAX_DELAY_SECS,
};
use crate::error::{Error, Result};
use crate::models::{DepthSnapshot, PriceOverview};
use crate::utils::encode_component;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15",
];

pub struct MarketClient {
    clients: Vec<HttpClient>,
    base_url: String,
    max_retries: u32,
    base_delay: StdDuration,
}

impl MarketClient {
    pub fn new() -> Result<Self> {
        Self::with_retry_policy(MAX_RETRIES, StdDuration::from_millis(RETRY_BASE_DELAY_MS))
    }

    /// Build the client pool with an explicit retry policy.
    pub fn with_retry_policy(max_retries: u32, base_delay: StdDuration) -> Result<Self> {
        let mut clients = Vec::new();

        let direct = HttpClient::builder()
            .timeout(StdDuration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        clients.push(direct);

        if let Ok(proxy_urls) = std::env::var("HTTP_PROXIES") {
            for proxy_url in proxy_urls.split(',') {
                let proxy_url = proxy_url.trim();
                if proxy_url.is_empty() {
                    continue;
                }
                match proxy_url.parse::<isahc::http::Uri>() {
                    Ok(proxy_uri) => match HttpClient::builder()
                        .proxy(Some(proxy_uri))
                        .timeout(StdDuration::from_secs(HTTP_TIMEOUT_SECS))
                        .build()
                    {
                        Ok(client) => {
                            clients.push(client);
                            info!("Added proxy client");
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to build proxy client, skipping");
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "Invalid proxy URL, skipping");
                    }
                }
            }
        }

        Ok(Self {
            clients,
            base_url: MARKET_BASE_URL.to_string(),
            max_retries,
            base_delay,
        })
    }

    /// Fetch the order-book depth for an item's numeric id.
    ///
    /// `Ok(None)` means the endpoint answered but the payload lacked the
    /// expected depth fields; the caller treats that like a missing id,
    /// not a fetch error.
    pub async fn fetch_depth(&self, item_nameid: u64) -> Result<Option<DepthSnapshot>> {
        let url = format!(
            "{}/itemordershistogram?norender=1&country=NL&language=english&currency=3&item_nameid={}&two_factor=0",
            self.base_url, item_nameid
        );
        let payload = self
            .get_with_retry(&url, false, |text| {
                serde_json::from_str::<Value>(text).map_err(|e| e.to_string())
            })
            .await?;
        Ok(DepthSnapshot::from_value(&payload))
    }

    /// One-off quote for a named item from the price-overview endpoint.
    pub async fn fetch_price_overview(&self, hash_name: &str) -> Result<PriceOverview> {
        let url = format!(
            "{}/priceoverview/?currency=1&appid={}&market_hash_name={}",
            self.base_url,
            GAME_ID,
            encode_component(hash_name)
        );
        let payload = self
            .get_with_retry(&url, false, |text| {
                serde_json::from_str::<Value>(text).map_err(|e| e.to_string())
            })
            .await?;
        Ok(PriceOverview::from_value(&payload))
    }

    /// Fetch an item's listing HTML page (used for name-id extraction).
    /// Sent with browser headers; the endpoint rejects bare clients.
    pub async fn fetch_listing_page(&self, hash_name: &str) -> Result<String> {
        let url = format!(
            "{}/listings/{}/{}",
            self.base_url,
            GAME_ID,
            encode_component(hash_name)
        );
        self.get_with_retry(&url, true, |text| Ok(text.to_string()))
            .await
    }

    async fn get_with_retry<T>(
        &self,
        url: &str,
        browser_headers: bool,
        parse: impl Fn(&str) -> std::result::Result<T, String>,
    ) -> Result<T> {
        let mut last_error: Option<String> = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = StdDuration::from_secs_f64(
                    self.base_delay.as_secs_f64() * 2.0_f64.powi(attempt as i32 - 1)
                        + rand::random::<f64>(),
                );
                let delay = delay.min(StdDuration::from_secs(RETRY_MAX_DELAY_SECS));
                let reason = last_error.as_deref().unwrap_or("unknown error");
                info!(
                    "Retry backoff: attempt {}/{} - reason: {}, waiting {:.1}s",
                    attempt + 1,
                    self.max_retries,
                    reason,
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            }

            let client = &self.clients[attempt as usize % self.clients.len()];

            let mut builder = isahc::Request::builder()
                .uri(url)
                .method("GET")
                .header("Accept", "*/*");
            if browser_headers {
                use rand::seq::SliceRandom;
                let user_agent = USER_AGENTS
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(USER_AGENTS[0]);
                builder = builder
                    .header("User-Agent", user_agent)
                    .header("Accept-Language", "en-US,en;q=0.9");
            }
            let request = builder
                .body(())
                .map_err(|e| Error::InvalidInput(format!("Request build error: {}", e)))?;

            debug!(url, attempt = attempt + 1, "Sending request");

            match client.send_async(request).await {
                Ok(mut resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.text().await {
                            Ok(text) => match parse(&text) {
                                Ok(value) => return Ok(value),
                                Err(e) => {
                                    last_error = Some(format!("Parse error: {}", e));
                                    continue;
                                }
                            },
                            Err(e) => {
                                last_error = Some(format!("Response body error: {}", e));
                                continue;
                            }
                        }
                    } else if status == 403 || status == 429 || status.is_server_error() {
                        last_error = Some(format!("HTTP {}", status.as_u16()));
                        continue;
                    } else if status.is_client_error() {
                        // Request problems never improve with retries.
                        return Err(Error::Network(format!(
                            "Client error ({}) - not retryable",
                            status.as_u16()
                        )));
                    } else {
                        last_error = Some(format!("HTTP {}", status.as_u16()));
                        continue;
                    }
                }
                Err(e) => {
                    last_error = Some(format!("Network error: {}", e));
                    continue;
                }
            }
        }

        Err(Error::FetchFailed(
            last_error.unwrap_or_else(|| "max retries exceeded".to_string()),
        ))
    }
}
