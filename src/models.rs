// src/models.rs
//! Wire types shared by the live feed, the mock fixtures and the HTTP layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Returns `None` unless both components are finite and inside the WGS84 ranges.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
        let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
        (lat_ok && lon_ok).then_some(Self { lat, lon })
    }

    /// Cache key: the literal `"<lat>,<lon>"` pairing, no rounding.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// One alert as published by the upstream feed. Field names follow the feed verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertItem {
    pub id: String,
    #[serde(rename = "alertid")]
    pub alert_id: String,
    pub time: String,
    pub category: String,
    pub header: String,
    pub text: String,
    #[serde(rename = "ttlseconds")]
    pub ttl_seconds: String,
    #[serde(rename = "redwebno")]
    pub redweb_no: String,
    pub title: String,
}

/// Upstream envelope. `items` stays optional so a malformed body can be told apart
/// from an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertResponse {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<AlertItem>>,
}

/// Envelope returned by `/mock-alerts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MockAlertResponse {
    pub date: String,
    pub status: i64,
    pub items: Vec<AlertItem>,
}

/// Entry of the secondary notifications feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: String,
    pub time: u64,
    pub threat: i32,
    pub is_drill: bool,
    pub cities: Vec<String>,
}

/// `Date.prototype.toUTCString()` style timestamp used in mock envelopes.
pub fn utc_date_string(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn coordinate_rejects_out_of_range_and_non_finite() {
        assert!(Coordinate::new(32.08, 34.78).is_some());
        assert!(Coordinate::new(90.0, -180.0).is_some());
        assert!(Coordinate::new(90.5, 0.0).is_none());
        assert!(Coordinate::new(0.0, 181.0).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0).is_none());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn cache_key_keeps_received_precision() {
        let a = Coordinate::new(31.7683, 35.2137).unwrap();
        let b = Coordinate::new(31.76830001, 35.2137).unwrap();
        assert_eq!(a.cache_key(), "31.7683,35.2137");
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(Coordinate::new(32.0, 35.0).unwrap().cache_key(), "32,35");
    }

    #[test]
    fn alert_item_uses_feed_field_names() {
        let raw = r#"{
            "id": "1", "alertid": "10", "time": "2024-10-01 16:11:04",
            "category": "MissileAlert", "header": "X", "text": "t",
            "ttlseconds": "59", "redwebno": "1384", "title": "T"
        }"#;
        let item: AlertItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.alert_id, "10");
        assert_eq!(item.redweb_no, "1384");
        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["ttlseconds"], "59");
    }

    #[test]
    fn envelope_without_items_is_distinguishable() {
        let r: AlertResponse = serde_json::from_str(r#"{"date":"d","status":1}"#).unwrap();
        assert!(r.items.is_none());
        let r: AlertResponse = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert_eq!(r.items, Some(vec![]));
    }

    #[test]
    fn utc_date_string_matches_http_date_shape() {
        let t = chrono::Utc.with_ymd_and_hms(2024, 10, 1, 16, 11, 4).unwrap();
        assert_eq!(utc_date_string(t), "Tue, 01 Oct 2024 16:11:04 GMT");
    }
}
