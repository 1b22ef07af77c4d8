// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod city;
pub mod config;
pub mod error;
pub mod feed;
pub mod geocode;
pub mod logging;
pub mod metrics;
pub mod mock;
pub mod models;
pub mod rate_limit;
pub mod service;

pub use crate::api::{router, with_middleware, AppState, Collaborators};
pub use crate::error::AlertError;

use axum::Router;
use tracing::info;

use crate::config::Settings;

/// Build the full application router from the process environment:
/// live collaborators, `/metrics`, and all middleware.
pub async fn app() -> anyhow::Result<Router> {
    let settings = Settings::from_env();
    let metrics = crate::metrics::Metrics::init(settings.geocode_ttl.as_secs())?;
    let state = AppState::from_settings(&settings)?.with_metrics(metrics);

    info!(
        geocoder = %settings.geocoder_url,
        cache_ttl_secs = settings.geocode_ttl.as_secs(),
        rate_limit_max = settings.rate_limit_max,
        alert_feed_configured = settings.alert_feed_url.resolve().is_some(),
        "alert relay configured"
    );

    Ok(router(state))
}
