// src/rate_limit.rs
//! Per-client fixed-window request limiter.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;

/// Windows are pruned once the map holds this many clients.
const PRUNE_AT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window closes.
    pub reset_secs: u64,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// `max == 0` disables limiting.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max > 0
    }

    pub fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Decision {
        let mut map = self.clients.lock().unwrap_or_else(|p| p.into_inner());

        if map.len() >= PRUNE_AT {
            let window = self.window;
            map.retain(|_, w| now.duration_since(w.started) < window);
        }

        let w = map.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(w.started) >= self.window {
            w.started = now;
            w.count = 0;
        }

        let reset_secs = self
            .window
            .saturating_sub(now.duration_since(w.started))
            .as_secs();

        if w.count >= self.max {
            return Decision {
                allowed: false,
                limit: self.max,
                remaining: 0,
                reset_secs,
            };
        }
        w.count += 1;
        Decision {
            allowed: true,
            limit: self.max,
            remaining: self.max - w.count,
            reset_secs,
        }
    }
}

/// Client address for limiting.
///
/// The rightmost `x-forwarded-for` hop is the one our proxy appended; anything
/// left of it is whatever the client sent. Falls back to `x-real-ip`, then the
/// socket peer, then a shared `"unknown"` bucket.
pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.rsplit(',').next().unwrap_or(s).trim().to_string())
            .filter(|s| !s.is_empty())
    };
    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
