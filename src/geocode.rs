// src/geocode.rs
//! Reverse geocoding with an in-process TTL cache.
//!
//! The public geocoder is rate-limited, so every successful lookup is cached
//! under the raw `"<lat>,<lon>"` key. Failures and empty answers are never cached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;

use crate::config::{GEOCODER_TIMEOUT, GEOCODER_USER_AGENT};
use crate::logging::{DynSink, Level};
use crate::models::Coordinate;

/// Address block of a reverse-geocoding answer. Only the place-name levels we use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub hamlet: Option<String>,
    pub county: Option<String>,
}

impl Address {
    /// First non-empty of city, town, village, hamlet, county.
    pub fn place_name(&self) -> Option<&str> {
        [
            &self.city,
            &self.town,
            &self.village,
            &self.hamlet,
            &self.county,
        ]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .find(|v| !v.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` when the service answered without an address block.
    async fn reverse(&self, coord: Coordinate) -> Result<Option<Address>>;
    fn name(&self) -> &'static str;
}

/// Nominatim `/reverse` client, Hebrew names, address details on.
pub struct NominatimGeocoder {
    http: reqwest::Client,
    url: String,
}

impl NominatimGeocoder {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(GEOCODER_USER_AGENT)
            .timeout(GEOCODER_TIMEOUT)
            .build()
            .context("building geocoder http client")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, coord: Coordinate) -> Result<Option<Address>> {
        let resp = self
            .http
            .get(&self.url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
                ("addressdetails", "1".to_string()),
                ("accept_language", "he".to_string()),
            ])
            .send()
            .await
            .context("geocoder http get()")?
            .error_for_status()
            .context("geocoder http status")?;

        let body: ReverseResponse = resp.json().await.context("geocoder json body")?;
        Ok(body.address)
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut g = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *g += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub city: String,
    pub expires_at: DateTime<Utc>,
}

/// Expired entries are swept on insert once the map holds this many keys.
const SWEEP_AT: usize = 10_000;

#[derive(Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    /// Earliest time the next time-based sweep may run.
    next_sweep: Option<DateTime<Utc>>,
}

pub struct GeocodeCache {
    geocoder: Arc<dyn ReverseGeocoder>,
    entries: Mutex<Entries>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    sink: DynSink,
}

impl GeocodeCache {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, ttl: std::time::Duration, sink: DynSink) -> Self {
        Self::with_clock(geocoder, ttl, sink, Arc::new(SystemClock))
    }

    pub fn with_clock(
        geocoder: Arc<dyn ReverseGeocoder>,
        ttl: std::time::Duration,
        sink: DynSink,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1));
        Self {
            geocoder,
            entries: Mutex::new(Entries::default()),
            ttl,
            clock,
            sink,
        }
    }

    /// City for `coord`, or `None` when it cannot be determined.
    ///
    /// Geocoder errors are recorded and swallowed here; they never reach callers.
    pub async fn resolve(&self, coord: Coordinate) -> Option<String> {
        let key = coord.cache_key();

        if let Some(city) = self.lookup(&key) {
            counter!("geocode_cache_hits_total").increment(1);
            return Some(city);
        }
        counter!("geocode_cache_misses_total").increment(1);

        let address = match self.geocoder.reverse(coord).await {
            Ok(a) => a,
            Err(e) => {
                self.sink.record(
                    Level::Error,
                    "Geocoding error",
                    json!({ "geocoder": self.geocoder.name(), "error": format!("{e:#}") }),
                );
                return None;
            }
        };

        let city = address.as_ref()?.place_name()?.to_string();

        self.insert(key, city.clone());
        Some(city)
    }

    /// Write an entry, sweeping expired keys at most once per TTL or when the
    /// map grows past [`SWEEP_AT`].
    fn insert(&self, key: String, city: String) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());

        let due = entries.next_sweep.is_some_and(|at| now >= at);
        if due || entries.map.len() >= SWEEP_AT {
            let before = entries.map.len();
            entries.map.retain(|_, e| now <= e.expires_at);
            counter!("geocode_cache_evictions_total")
                .increment((before - entries.map.len()) as u64);
        }
        if due || entries.next_sweep.is_none() {
            entries.next_sweep = Some(now + self.ttl);
        }

        entries.map.insert(
            key,
            CacheEntry {
                city,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Unexpired cached city. Expired entries are dropped on the way.
    fn lookup(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        match entries.map.get(key).map(|e| (now <= e.expires_at, e.city.clone())) {
            Some((true, city)) => Some(city),
            Some((false, _)) => {
                entries.map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Raw entry, expired or not. Diagnostics only.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .map
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(city: Option<&str>, town: Option<&str>, county: Option<&str>) -> Address {
        Address {
            city: city.map(String::from),
            town: town.map(String::from),
            county: county.map(String::from),
            ..Address::default()
        }
    }

    #[test]
    fn place_name_fallback_chain() {
        assert_eq!(addr(Some("חיפה"), Some("x"), None).place_name(), Some("חיפה"));
        assert_eq!(addr(None, Some("town"), Some("county")).place_name(), Some("town"));
        assert_eq!(addr(None, None, Some("county")).place_name(), Some("county"));
        assert_eq!(addr(Some(""), None, Some("county")).place_name(), Some("county"));
        assert_eq!(Address::default().place_name(), None);

        let v = Address {
            village: Some("v".into()),
            hamlet: Some("h".into()),
            ..Address::default()
        };
        assert_eq!(v.place_name(), Some("v"));
    }

    #[test]
    fn reverse_response_parses_nominatim_shape() {
        let raw = r#"{"place_id": 1, "address": {"city": "ירושלים", "country": "ישראל"}}"#;
        let r: ReverseResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(r.address.unwrap().place_name(), Some("ירושלים"));

        let r: ReverseResponse = serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert!(r.address.is_none());
    }

    #[test]
    fn manual_clock_advances() {
        let t0 = Utc::now();
        let c = ManualClock::new(t0);
        c.advance(chrono::Duration::seconds(10));
        assert_eq!(c.now() - t0, chrono::Duration::seconds(10));
    }
}
