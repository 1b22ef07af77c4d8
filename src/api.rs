// src/api.rs
//! HTTP surface: routes, shared state, and the middleware stack.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Settings;
use crate::error::{error_response, AlertError, ValidationError, MSG_INTERNAL, MSG_NOT_FOUND};
use crate::feed::{AlertFeed, HttpAlertFeed, HttpNotificationsFeed, NotificationsFeed};
use crate::geocode::{Clock, GeocodeCache, NominatimGeocoder, ReverseGeocoder, SystemClock};
use crate::logging::{DynSink, Level, TracingSink};
use crate::metrics::Metrics;
use crate::mock::{MockAlertSimulator, MockNotificationSimulator, RandomThreshold, ThresholdSource};
use crate::models::{AlertItem, Coordinate, MockAlertResponse, Notification};
use crate::rate_limit::{client_key, RateLimiter};
use crate::service::AlertFilterService;

/// Headers set on every response unless a handler already set them.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("cross-origin-resource-policy", "same-origin"),
    ("cross-origin-opener-policy", "same-origin"),
    ("x-dns-prefetch-control", "off"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Outbound collaborators the app talks to. Swapped for fakes in tests.
#[derive(Clone)]
pub struct Collaborators {
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub alert_feed: Arc<dyn AlertFeed>,
    pub notifications: Arc<dyn NotificationsFeed>,
    pub thresholds: Arc<dyn ThresholdSource>,
    pub sink: DynSink,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn production(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            geocoder: Arc::new(NominatimGeocoder::new(settings.geocoder_url.clone())?),
            alert_feed: Arc::new(HttpAlertFeed::new(settings.alert_feed_url.clone())?),
            notifications: Arc::new(HttpNotificationsFeed::new(
                settings.notifications_url.clone(),
            )?),
            thresholds: Arc::new(RandomThreshold),
            sink: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub geocode: Arc<GeocodeCache>,
    pub alerts: Arc<AlertFilterService>,
    pub mock_alerts: Arc<MockAlertSimulator>,
    pub mock_notifications: Arc<MockNotificationSimulator>,
    pub notifications: Arc<dyn NotificationsFeed>,
    pub rate_limiter: Arc<RateLimiter>,
    pub sink: DynSink,
    /// `/metrics` is only routed when a recorder is installed.
    pub metrics: Option<Metrics>,
}

impl AppState {
    pub fn new(settings: &Settings, c: Collaborators) -> Self {
        let geocode = Arc::new(GeocodeCache::with_clock(
            c.geocoder,
            settings.geocode_ttl,
            c.sink.clone(),
            c.clock,
        ));
        let alerts = Arc::new(AlertFilterService::new(
            geocode.clone(),
            c.alert_feed,
            c.sink.clone(),
        ));
        Self {
            geocode,
            alerts,
            mock_alerts: Arc::new(MockAlertSimulator::new(c.thresholds.clone(), c.sink.clone())),
            mock_notifications: Arc::new(MockNotificationSimulator::new(
                c.thresholds,
                c.sink.clone(),
            )),
            notifications: c.notifications,
            rate_limiter: Arc::new(RateLimiter::new(
                settings.rate_limit_max,
                settings.rate_limit_window,
            )),
            sink: c.sink,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::new(settings, Collaborators::production(settings)?))
    }
}

pub fn router(state: AppState) -> Router {
    let mut routes = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/alerts", get(alerts))
        .route("/mock-alerts", get(mock_alerts))
        .route("/notifications", get(notifications))
        .route("/mock-notifications", get(mock_notifications))
        .fallback(not_found);
    if state.metrics.is_some() {
        routes = routes.route("/metrics", get(metrics_text));
    }
    with_middleware(routes, state)
}

/// Wrap `routes` in the rate limiter, CORS, security headers and the panic
/// handler, then bind `state`.
pub fn with_middleware(routes: Router<AppState>, state: AppState) -> Router {
    let mut app = routes
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(CorsLayer::very_permissive());

    for &(name, value) in SECURITY_HEADERS {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    app.layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct CoordQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// Checks presence, then numeric value and range. No I/O.
pub fn parse_coordinate(q: &CoordQuery) -> Result<Coordinate, ValidationError> {
    let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_owned);
    let (Some(lat), Some(lon)) = (present(&q.lat), present(&q.lon)) else {
        return Err(ValidationError::MissingCoordinates);
    };
    let lat = parse_float_prefix(&lat).ok_or(ValidationError::InvalidCoordinates)?;
    let lon = parse_float_prefix(&lon).ok_or(ValidationError::InvalidCoordinates)?;
    Coordinate::new(lat, lon).ok_or(ValidationError::InvalidCoordinates)
}

/// Longest leading run that parses as a float, after leading whitespace.
/// `"32.1abc"` gives 32.1, `"abc"` gives `None`.
pub(crate) fn parse_float_prefix(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let mut end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    while end > 0 {
        if let Ok(v) = s[..end].parse::<f64>() {
            return Some(v);
        }
        end -= 1;
    }
    None
}

fn validate(state: &AppState, endpoint: &str, q: &CoordQuery) -> Result<Coordinate, AlertError> {
    parse_coordinate(q).map_err(|v| {
        let (message, details) = match v {
            ValidationError::MissingCoordinates => (
                "Missing geolocation data",
                "lat or lon query parameter is missing.",
            ),
            ValidationError::InvalidCoordinates => (
                "Invalid geolocation data",
                "lat or lon query parameter is not a valid number.",
            ),
        };
        state.sink.record(
            Level::Info,
            message,
            json!({ "endpoint": endpoint, "status": 400, "details": details }),
        );
        AlertError::Validation(v)
    })
}

async fn alerts(
    State(state): State<AppState>,
    Query(q): Query<CoordQuery>,
) -> Result<Json<Vec<AlertItem>>, AlertError> {
    let coord = validate(&state, "/alerts", &q)?;
    let items = state.alerts.relevant_alerts(coord).await?;
    Ok(Json(items))
}

async fn mock_alerts(
    State(state): State<AppState>,
    Query(q): Query<CoordQuery>,
) -> Result<Json<MockAlertResponse>, AlertError> {
    state.mock_alerts.record_call();
    let coord = validate(&state, "/mock-alerts", &q)?;

    let Some(city) = state.geocode.resolve(coord).await else {
        state.sink.record(
            Level::Error,
            "Geocoding failed",
            json!({
                "endpoint": "/mock-alerts",
                "status": 500,
                "details": format!("Could not determine city for lat={}, lon={}", coord.lat, coord.lon),
            }),
        );
        return Err(AlertError::GeocodingUnavailable {
            lat: coord.lat,
            lon: coord.lon,
        });
    };

    Ok(Json(state.mock_alerts.respond(Some(&city))))
}

async fn notifications(State(state): State<AppState>) -> Result<Json<Value>, AlertError> {
    match state.notifications.fetch_raw().await {
        Ok(body) => {
            state.sink.record(
                Level::Info,
                "Fetched notifications",
                json!({ "endpoint": "/notifications", "status": 200, "data": body }),
            );
            Ok(Json(body))
        }
        Err(e) => {
            state.sink.record(
                Level::Error,
                "Error fetching data from Tzeva Adom API",
                json!({ "endpoint": "/notifications", "status": 500, "details": format!("{e:#}") }),
            );
            Err(AlertError::NotificationsFetch(e))
        }
    }
}

async fn mock_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.mock_notifications.invoke())
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(m) => m.render().into_response(),
        None => not_found().await,
    }
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, MSG_NOT_FOUND)
}

async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.rate_limiter.is_enabled() {
        return next.run(req).await;
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client = client_key(req.headers(), peer);
    let decision = state.rate_limiter.check(&client);

    let mut resp = if decision.allowed {
        next.run(req).await
    } else {
        counter!("rate_limited_total").increment(1);
        tracing::warn!(%client, "rate limit exceeded");
        AlertError::RateLimited.into_response()
    };

    let h = resp.headers_mut();
    h.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    h.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    h.insert("ratelimit-reset", HeaderValue::from(decision.reset_secs));
    resp
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(%detail, "handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL)
}
