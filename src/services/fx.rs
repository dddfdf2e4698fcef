//! Currency conversion for price overviews.
//!
//! The USD -> EUR rate is fetched once before a run and threaded through
//! `PriceFormatter` as a plain value; a fetch failure falls back to the
//! default rate instead of aborting.

use isahc::{config::Configurable, prelude::*, HttpClient};
use serde_json::Value;
use std::time::Duration as StdDuration;
use tracing::warn;

use crate::constants::{DEFAULT_USD_TO_EUR, FX_RATES_URL, HTTP_TIMEOUT_SECS};
use crate::error::{Error, Result};

/// Formats foreign-currency quotes with an explicit conversion rate.
#[derive(Debug, Clone, Copy)]
pub struct PriceFormatter {
    usd_to_eur: f64,
}

impl PriceFormatter {
    pub fn new(usd_to_eur: f64) -> Self {
        Self { usd_to_eur }
    }

    /// Convert a `"$12.34"`-style USD quote to a `"11.11€"` EUR string.
    /// Unparsable input is returned unchanged.
    pub fn usd_to_eur(&self, usd: &str) -> String {
        let cleaned = usd.trim().trim_start_matches('$').replace(',', "");
        match cleaned.parse::<f64>() {
            Ok(amount) => format!("{:.2}€", amount * self.usd_to_eur),
            Err(_) => usd.to_string(),
        }
    }
}

impl Default for PriceFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_USD_TO_EUR)
    }
}

/// Fetch the current USD -> EUR rate, falling back to the default on any
/// failure (a stale rate only skews display formatting, never stored depth
/// data).
pub async fn fetch_usd_to_eur() -> f64 {
    match try_fetch_rate().await {
        Ok(rate) => rate,
        Err(e) => {
            warn!(error = %e, fallback = DEFAULT_USD_TO_EUR, "FX rate fetch failed");
            DEFAULT_USD_TO_EUR
        }
    }
}

async fn try_fetch_rate() -> Result<f64> {
    let http = HttpClient::builder()
        .timeout(StdDuration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

    let mut response = http
        .get_async(FX_RATES_URL)
        .await
        .map_err(|e| Error::Network(format!("FX fetch failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::Network(format!(
            "FX fetch failed: HTTP {}",
            response.status().as_u16()
        )));
    }

    let text = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("FX body error: {}", e)))?;
    let payload: Value = serde_json::from_str(&text)?;

    payload
        .get("rates")
        .and_then(|r| r.get("EUR"))
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::Parse("FX response missing rates.EUR".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_to_eur_conversion() {
        let formatter = PriceFormatter::new(0.9);
        assert_eq!(formatter.usd_to_eur("$10.00"), "9.00€");
        assert_eq!(formatter.usd_to_eur("$1,234.50"), "1111.05€");
    }

    #[test]
    fn test_usd_to_eur_unparsable_passthrough() {
        let formatter = PriceFormatter::default();
        assert_eq!(formatter.usd_to_eur("n/a"), "n/a");
    }
}
