//! Remote catalog and name-id table access.
//!
//! The catalog lives in a raw-file endpoint (optionally token-gated); the
//! community name-id table is public. Both are read once per run. The
//! name-id table prefers the local backup when present, since the backfill
//! loop keeps it fresher than the upstream snapshot.

use isahc::{config::Configurable, prelude::*, HttpClient};
use std::path::Path;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

use crate::constants::{CATALOG_URL, HTTP_TIMEOUT_SECS, NAME_ID_TABLE_URL};
use crate::error::{Error, Result};
use crate::models::{load_name_id_table, CatalogItem, NameIdTable};

pub struct CatalogClient {
    http: HttpClient,
    github_token: Option<String>,
}

impl CatalogClient {
    pub fn new() -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(StdDuration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            github_token: std::env::var("BOT_GITHUB_TOKEN").ok(),
        })
    }

    /// Fetch the ordered item catalog.
    pub async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>> {
        let mut builder = isahc::Request::builder().uri(CATALOG_URL).method("GET");
        if let Some(token) = &self.github_token {
            builder = builder.header("Authorization", format!("token {}", token));
        }
        let request = builder
            .body(())
            .map_err(|e| Error::InvalidInput(format!("Request build error: {}", e)))?;

        let mut response = self
            .http
            .send_async(request)
            .await
            .map_err(|e| Error::Network(format!("Catalog fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "Catalog fetch failed: HTTP {}",
                response.status().as_u16()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Catalog body error: {}", e)))?;
        let items: Vec<CatalogItem> = serde_json::from_str(&text)?;
        info!(items = items.len(), "Catalog loaded");
        Ok(items)
    }

    /// Load the identity -> numeric id table: local backup first, remote
    /// table as fallback.
    pub async fn fetch_name_id_table(&self, local_path: &Path) -> Result<NameIdTable> {
        match load_name_id_table(local_path) {
            Ok(table) => {
                info!(entries = table.len(), "Name-id table loaded from local backup");
                return Ok(table);
            }
            Err(e) => {
                warn!(error = %e, "No usable local name-id table, fetching remote");
            }
        }

        let mut response = self
            .http
            .get_async(NAME_ID_TABLE_URL)
            .await
            .map_err(|e| Error::Network(format!("Name-id table fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "Name-id table fetch failed: HTTP {}",
                response.status().as_u16()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Name-id table body error: {}", e)))?;
        let table: NameIdTable = serde_json::from_str(&text)?;
        info!(entries = table.len(), "Name-id table loaded from remote");
        Ok(table)
    }
}
