//! Fetched market records and the order-book depth payload contract.
//!
//! The upstream depth payload is undocumented, so only the consumed fields
//! are modeled, and numeric fields are accepted as either JSON numbers or
//! digit strings (both shapes have been observed).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::CatalogItem;

/// One item's market state as stored in shard outputs and the canonical
/// dataset. Prices are two-decimal major-unit strings; `date_modified` is
/// epoch milliseconds of the fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub hash_name: String,
    pub item_nameid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub sell_order_count: u64,
    pub buy_order_count: u64,
    pub lowest_sell_order: String,
    pub highest_buy_order: String,
    pub date_modified: i64,
}

impl MarketRecord {
    /// Build a record from a depth snapshot, stamped with the current time.
    pub fn from_depth(item: &CatalogItem, item_nameid: u64, depth: &DepthSnapshot) -> Self {
        Self {
            hash_name: item.hash_name.clone(),
            item_nameid,
            image: item.image.clone(),
            sell_order_count: depth.sell_order_count,
            buy_order_count: depth.buy_order_count,
            lowest_sell_order: format_minor_units(depth.lowest_sell_order),
            highest_buy_order: format_minor_units(depth.highest_buy_order),
            date_modified: Utc::now().timestamp_millis(),
        }
    }
}

/// The depth fields consumed from the order-histogram endpoint, in
/// minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthSnapshot {
    pub sell_order_count: u64,
    pub buy_order_count: u64,
    pub lowest_sell_order: i64,
    pub highest_buy_order: i64,
}

impl DepthSnapshot {
    /// Extract the depth fields from a response payload.
    ///
    /// Returns `None` when any expected field is absent or null. That is the
    /// missing-id condition (the endpoint answered, but not for a live
    /// order book), not a fetch error.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            sell_order_count: value_as_u64(value.get("sell_order_count")?)?,
            buy_order_count: value_as_u64(value.get("buy_order_count")?)?,
            lowest_sell_order: value_as_i64(value.get("lowest_sell_order")?)?,
            highest_buy_order: value_as_i64(value.get("highest_buy_order")?)?,
        })
    }
}

/// Single-item quote from the price-overview endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceOverview {
    pub lowest_price: Option<String>,
    pub buy_order_price: Option<String>,
}

impl PriceOverview {
    pub fn from_value(value: &Value) -> Self {
        Self {
            lowest_price: value
                .get("lowest_price")
                .and_then(Value::as_str)
                .map(str::to_string),
            buy_order_price: value
                .get("lowest_buy_order")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Convert a minor-currency-unit amount to a fixed two-decimal major-unit
/// string, e.g. `1234` -> `"12.34"`.
pub fn format_minor_units(minor: i64) -> String {
    format!("{:.2}", minor as f64 / 100.0)
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.replace(',', "").parse().ok(),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.replace(',', "").parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(1234), "12.34");
        assert_eq!(format_minor_units(5), "0.05");
        assert_eq!(format_minor_units(100), "1.00");
        assert_eq!(format_minor_units(0), "0.00");
    }

    #[test]
    fn test_depth_from_numeric_payload() {
        let payload = json!({
            "success": 1,
            "sell_order_count": 36,
            "buy_order_count": 120,
            "lowest_sell_order": 1234,
            "highest_buy_order": 1100
        });
        let depth = DepthSnapshot::from_value(&payload).unwrap();
        assert_eq!(depth.sell_order_count, 36);
        assert_eq!(depth.lowest_sell_order, 1234);
    }

    #[test]
    fn test_depth_from_string_payload() {
        let payload = json!({
            "sell_order_count": "1,036",
            "buy_order_count": "120",
            "lowest_sell_order": "1234",
            "highest_buy_order": "1100"
        });
        let depth = DepthSnapshot::from_value(&payload).unwrap();
        assert_eq!(depth.sell_order_count, 1036);
        assert_eq!(depth.highest_buy_order, 1100);
    }

    #[test]
    fn test_depth_missing_field_is_none() {
        let payload = json!({
            "sell_order_count": 36,
            "buy_order_count": 120,
            "lowest_sell_order": 1234
        });
        assert!(DepthSnapshot::from_value(&payload).is_none());
    }

    #[test]
    fn test_depth_null_field_is_none() {
        let payload = json!({
            "sell_order_count": 36,
            "buy_order_count": 120,
            "lowest_sell_order": null,
            "highest_buy_order": 1100
        });
        assert!(DepthSnapshot::from_value(&payload).is_none());
    }

    #[test]
    fn test_record_from_depth() {
        let item = CatalogItem {
            hash_name: "AK-47 | Redline (Field-Tested)".to_string(),
            image: Some("img".to_string()),
            date_modified: Some(1),
        };
        let depth = DepthSnapshot {
            sell_order_count: 10,
            buy_order_count: 20,
            lowest_sell_order: 950,
            highest_buy_order: 901,
        };
        let record = MarketRecord::from_depth(&item, 282, &depth);
        assert_eq!(record.item_nameid, 282);
        assert_eq!(record.lowest_sell_order, "9.50");
        assert_eq!(record.highest_buy_order, "9.01");
        assert!(record.date_modified > 0);
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = MarketRecord {
            hash_name: "item".to_string(),
            item_nameid: 7,
            image: None,
            sell_order_count: 1,
            buy_order_count: 2,
            lowest_sell_order: "0.10".to_string(),
            highest_buy_order: "0.05".to_string(),
            date_modified: 1_718_000_000_000,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: MarketRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
