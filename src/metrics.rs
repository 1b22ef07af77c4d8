// src/metrics.rs
//! Prometheus recorder shared by every router built in this process.

use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the cache TTL gauge.
    pub fn init(geocode_ttl_secs: u64) -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())?
            .clone();

        gauge!("geocode_cache_ttl_seconds").set(geocode_ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Current snapshot in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
