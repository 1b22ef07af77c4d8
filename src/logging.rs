// src/logging.rs
//! Tracing setup and the request-path event sink.
//!
//! Handlers and services never talk to `tracing` directly for business events;
//! they go through [`EventSink`] so tests can count what was recorded.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "RELAY_LOG_FORMAT";
const DEFAULT_FILTER: &str = "alert_relay=info,warn";

/// Install the global subscriber. Safe to call when the deployment runtime
/// already installed one; the second install is simply skipped.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };

    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Fire-and-forget sink for business events. Implementations must not block
/// and must not fail.
pub trait EventSink: Send + Sync {
    fn record(&self, level: Level, message: &str, fields: Value);
}

pub type DynSink = Arc<dyn EventSink>;

/// Production sink: one `tracing` event per record, fields attached as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, level: Level, message: &str, fields: Value) {
        match level {
            Level::Info => tracing::info!(target: "alert_relay::events", %fields, "{message}"),
            Level::Error => tracing::error!(target: "alert_relay::events", %fields, "{message}"),
        }
    }
}

/// A recorded event, as kept by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub level: Level,
    pub message: String,
    pub fields: Value,
}

/// In-memory sink for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn count(&self, level: Level) -> usize {
        self.events().iter().filter(|e| e.level == level).count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, level: Level, message: &str, fields: Value) {
        let ev = Event {
            level,
            message: message.to_string(),
            fields,
        };
        match self.events.lock() {
            Ok(mut g) => g.push(ev),
            Err(poison) => poison.into_inner().push(ev),
        }
    }
}
