// tests/common/mod.rs
//
// Fake collaborators and router helpers shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alert_relay::config::Settings;
use alert_relay::feed::{AlertFeed, NotificationsFeed};
use alert_relay::geocode::{Address, Clock, ReverseGeocoder, SystemClock};
use alert_relay::logging::MemorySink;
use alert_relay::mock::{FixedThresholds, ThresholdSource};
use alert_relay::models::{AlertItem, Coordinate};
use alert_relay::{AppState, Collaborators};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{body, Router};
use serde_json::Value;

pub const BODY_LIMIT: usize = 1024 * 1024;

pub enum GeoAnswer {
    Found(Address),
    NoAddress,
    Fails,
}

pub struct FakeGeocoder {
    answer: GeoAnswer,
    calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn city(name: &str) -> Arc<Self> {
        Self::with(GeoAnswer::Found(Address {
            city: Some(name.to_string()),
            ..Address::default()
        }))
    }

    pub fn with(answer: GeoAnswer) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for FakeGeocoder {
    async fn reverse(&self, _coord: Coordinate) -> Result<Option<Address>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            GeoAnswer::Found(a) => Ok(Some(a.clone())),
            GeoAnswer::NoAddress => Ok(None),
            GeoAnswer::Fails => Err(anyhow!("connection refused")),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeFeed {
    items: Option<Vec<AlertItem>>,
    calls: AtomicUsize,
}

impl FakeFeed {
    pub fn items(items: Vec<AlertItem>) -> Arc<Self> {
        Arc::new(Self {
            items: Some(items),
            calls: AtomicUsize::new(0),
        })
    }

    /// Behaves like a feed whose body has no `items` field.
    pub fn malformed() -> Arc<Self> {
        Arc::new(Self {
            items: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertFeed for FakeFeed {
    async fn fetch_items(&self) -> Result<Vec<AlertItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items
            .clone()
            .ok_or_else(|| anyhow!("Invalid response format from ALERT_API_URL."))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeNotifications {
    body: Option<Value>,
}

impl FakeNotifications {
    pub fn ok(body: Value) -> Arc<Self> {
        Arc::new(Self { body: Some(body) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { body: None })
    }
}

#[async_trait]
impl NotificationsFeed for FakeNotifications {
    async fn fetch_raw(&self) -> Result<Value> {
        self.body.clone().ok_or_else(|| anyhow!("timeout"))
    }
}

pub fn item(id: &str, header: &str) -> AlertItem {
    AlertItem {
        id: id.to_string(),
        alert_id: format!("100{id}"),
        time: "2024-10-01 16:11:04".to_string(),
        category: "MissileAlert".to_string(),
        header: header.to_string(),
        text: "היכנסו למרחב המוגן".to_string(),
        ttl_seconds: "59".to_string(),
        redweb_no: id.to_string(),
        title: "ירי רקטות וטילים".to_string(),
    }
}

pub fn coord(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat, lon).expect("valid test coordinate")
}

/// Settings with rate limiting off.
pub fn test_settings() -> Settings {
    Settings {
        rate_limit_max: 0,
        ..Settings::default()
    }
}

pub struct Harness {
    pub geocoder: Arc<FakeGeocoder>,
    pub feed: Arc<FakeFeed>,
    pub sink: Arc<MemorySink>,
    pub state: AppState,
    pub app: Router,
}

pub struct HarnessBuilder {
    settings: Settings,
    geocoder: Arc<FakeGeocoder>,
    feed: Arc<FakeFeed>,
    notifications: Arc<FakeNotifications>,
    thresholds: Arc<dyn ThresholdSource>,
    clock: Arc<dyn Clock>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            settings: test_settings(),
            geocoder: FakeGeocoder::city("X"),
            feed: FakeFeed::items(Vec::new()),
            notifications: FakeNotifications::ok(Value::Array(Vec::new())),
            thresholds: Arc::new(FixedThresholds::new([2])),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn settings(mut self, s: Settings) -> Self {
        self.settings = s;
        self
    }

    pub fn geocoder(mut self, g: Arc<FakeGeocoder>) -> Self {
        self.geocoder = g;
        self
    }

    pub fn feed(mut self, f: Arc<FakeFeed>) -> Self {
        self.feed = f;
        self
    }

    pub fn notifications(mut self, n: Arc<FakeNotifications>) -> Self {
        self.notifications = n;
        self
    }

    pub fn thresholds(mut self, t: Arc<dyn ThresholdSource>) -> Self {
        self.thresholds = t;
        self
    }

    pub fn build(self) -> Harness {
        let sink = Arc::new(MemorySink::new());
        let collab = Collaborators {
            geocoder: self.geocoder.clone(),
            alert_feed: self.feed.clone(),
            notifications: self.notifications,
            thresholds: self.thresholds,
            sink: sink.clone(),
            clock: self.clock,
        };
        let state = AppState::new(&self.settings, collab);
        Harness {
            geocoder: self.geocoder,
            feed: self.feed,
            sink,
            app: alert_relay::router(state.clone()),
            state,
        }
    }
}

pub async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json body")
}

/// Serve `app` on an ephemeral local port; returns the base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test upstream");
    });
    format!("http://{addr}")
}
