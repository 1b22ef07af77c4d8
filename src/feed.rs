// src/feed.rs
//! Upstream feed clients: the live alert feed and the public notifications feed.

use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use serde_json::Value;

use crate::config::{FeedUrl, UPSTREAM_TIMEOUT};
use crate::models::{AlertItem, AlertResponse};

pub const ALERT_FEED_REFERER: &str = "https://www.prog.co.il/";
pub const NOTIFICATIONS_REFERER: &str = "https://www.tzevaadom.co.il/";
const X_REQUESTED_WITH: &str = "XMLHttpRequest";

#[async_trait]
pub trait AlertFeed: Send + Sync {
    /// Current alert items in feed order. A body without `items` is an error.
    async fn fetch_items(&self) -> Result<Vec<AlertItem>>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait NotificationsFeed: Send + Sync {
    /// Raw JSON body, relayed as-is.
    async fn fetch_raw(&self) -> Result<Value>;
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .context("building upstream http client")
}

/// Single-shot GET against the configured alert feed. No retries.
pub struct HttpAlertFeed {
    http: Client,
    url: FeedUrl,
}

impl HttpAlertFeed {
    pub fn new(url: FeedUrl) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            url,
        })
    }
}

#[async_trait]
impl AlertFeed for HttpAlertFeed {
    async fn fetch_items(&self) -> Result<Vec<AlertItem>> {
        let url = self
            .url
            .resolve()
            .ok_or_else(|| anyhow!("ALERT_API_URL is not defined in environment variables."))?;

        let t0 = Instant::now();
        counter!("upstream_fetch_total").increment(1);

        let res: Result<Vec<AlertItem>> = async {
            let resp = self
                .http
                .get(&url)
                .header(reqwest::header::REFERER, ALERT_FEED_REFERER)
                .header("X-Requested-With", X_REQUESTED_WITH)
                .send()
                .await
                .context("alert feed http get()")?
                .error_for_status()
                .context("alert feed http status")?;
            let body: AlertResponse = resp.json().await.context("alert feed json body")?;
            body.items
                .ok_or_else(|| anyhow!("Invalid response format from ALERT_API_URL."))
        }
        .await;

        histogram!("upstream_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        if res.is_err() {
            counter!("upstream_fetch_errors_total").increment(1);
        }
        res
    }

    fn name(&self) -> &'static str {
        "pikud-haoref"
    }
}

pub struct HttpNotificationsFeed {
    http: Client,
    url: String,
}

impl HttpNotificationsFeed {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationsFeed for HttpNotificationsFeed {
    async fn fetch_raw(&self) -> Result<Value> {
        let resp = self
            .http
            .get(&self.url)
            .header(reqwest::header::REFERER, NOTIFICATIONS_REFERER)
            .header("X-Requested-With", X_REQUESTED_WITH)
            .send()
            .await
            .context("notifications http get()")?
            .error_for_status()
            .context("notifications http status")?;
        resp.json().await.context("notifications json body")
    }
}
