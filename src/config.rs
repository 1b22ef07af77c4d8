// src/config.rs
//! Environment-driven settings. Everything has a default except the upstream
//! alert feed URL, which is resolved per request.

use std::time::Duration;

// --- env names ---
pub const ENV_ALERT_API_URL: &str = "ALERT_API_URL";
pub const ENV_NOTIFICATIONS_API_URL: &str = "NOTIFICATIONS_API_URL";
pub const ENV_GEOCODER_URL: &str = "GEOCODER_URL";
pub const ENV_GEOCODE_CACHE_TTL_SECS: &str = "GEOCODE_CACHE_TTL_SECS";
pub const ENV_RATE_LIMIT_MAX: &str = "RATE_LIMIT_MAX";
pub const ENV_RATE_LIMIT_WINDOW_SECS: &str = "RATE_LIMIT_WINDOW_SECS";

// --- defaults ---
pub const DEFAULT_NOTIFICATIONS_API_URL: &str = "https://api.tzevaadom.co.il/notifications";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_GEOCODE_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 50;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;

pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);
pub const GEOCODER_TIMEOUT: Duration = Duration::from_secs(10);
pub const GEOCODER_USER_AGENT: &str = "MissileWarningProxy/1.0";

/// Where the live alert feed URL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUrl {
    /// Looked up in the named env var on every fetch.
    Env(&'static str),
    Fixed(String),
}

impl FeedUrl {
    /// Current URL, or `None` when unset or blank.
    pub fn resolve(&self) -> Option<String> {
        let raw = match self {
            FeedUrl::Env(name) => std::env::var(name).ok()?,
            FeedUrl::Fixed(s) => s.clone(),
        };
        let t = raw.trim();
        (!t.is_empty()).then(|| t.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub alert_feed_url: FeedUrl,
    pub notifications_url: String,
    pub geocoder_url: String,
    pub geocode_ttl: Duration,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alert_feed_url: FeedUrl::Env(ENV_ALERT_API_URL),
            notifications_url: DEFAULT_NOTIFICATIONS_API_URL.to_string(),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geocode_ttl: Duration::from_secs(DEFAULT_GEOCODE_CACHE_TTL_SECS),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

impl Settings {
    /// Read overrides from the process environment; bad numbers keep the default.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            alert_feed_url: d.alert_feed_url,
            notifications_url: env_string(ENV_NOTIFICATIONS_API_URL)
                .unwrap_or(d.notifications_url),
            geocoder_url: env_string(ENV_GEOCODER_URL).unwrap_or(d.geocoder_url),
            geocode_ttl: parse_u64(env_string(ENV_GEOCODE_CACHE_TTL_SECS))
                .map(Duration::from_secs)
                .unwrap_or(d.geocode_ttl),
            rate_limit_max: parse_u64(env_string(ENV_RATE_LIMIT_MAX))
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(d.rate_limit_max),
            rate_limit_window: parse_u64(env_string(ENV_RATE_LIMIT_WINDOW_SECS))
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(d.rate_limit_window),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_u64(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u64_rejects_garbage() {
        assert_eq!(parse_u64(Some("42".into())), Some(42));
        assert_eq!(parse_u64(Some("-1".into())), None);
        assert_eq!(parse_u64(Some("abc".into())), None);
        assert_eq!(parse_u64(None), None);
    }

    #[test]
    fn fixed_feed_url_blank_is_absent() {
        assert_eq!(FeedUrl::Fixed("  ".into()).resolve(), None);
        assert_eq!(
            FeedUrl::Fixed(" http://x/feed ".into()).resolve().as_deref(),
            Some("http://x/feed")
        );
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.geocode_ttl, Duration::from_secs(3600));
        assert_eq!(s.rate_limit_max, 50);
        assert_eq!(s.rate_limit_window, Duration::from_secs(900));
        assert_eq!(s.alert_feed_url, FeedUrl::Env(ENV_ALERT_API_URL));
    }
}
