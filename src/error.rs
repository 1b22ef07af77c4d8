// src/error.rs
//! Domain error taxonomy and its HTTP mapping.
//!
//! Client bodies are fixed strings; the underlying cause only goes to the
//! event sink.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const MSG_MISSING_COORDS: &str = "Missing latitude or longitude in query parameters.";
pub const MSG_INVALID_COORDS: &str = "Invalid latitude or longitude values.";
pub const MSG_GEOCODING_FAILED: &str = "Unable to determine city from geolocation data.";
pub const MSG_ALERT_FEED_FAILED: &str = "Error fetching data from Pikud HaOref API";
pub const MSG_NOTIFICATIONS_FAILED: &str = "Error fetching data from Tzeva Adom API";
pub const MSG_RATE_LIMITED: &str =
    "Too many requests from this IP, please try again after 15 minutes.";
pub const MSG_NOT_FOUND: &str = "Endpoint not found.";
pub const MSG_INTERNAL: &str = "Internal Server Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingCoordinates,
    InvalidCoordinates,
}

impl ValidationError {
    pub fn message(self) -> &'static str {
        match self {
            ValidationError::MissingCoordinates => MSG_MISSING_COORDS,
            ValidationError::InvalidCoordinates => MSG_INVALID_COORDS,
        }
    }
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("{}", .0.message())]
    Validation(ValidationError),

    #[error("could not determine city for {lat},{lon}")]
    GeocodingUnavailable { lat: f64, lon: f64 },

    #[error("alert feed fetch failed: {0:#}")]
    UpstreamFetch(#[source] anyhow::Error),

    #[error("notifications feed fetch failed: {0:#}")]
    NotificationsFetch(#[source] anyhow::Error),

    #[error("rate limit exceeded")]
    RateLimited,
}

impl AlertError {
    pub fn status(&self) -> StatusCode {
        match self {
            AlertError::Validation(_) => StatusCode::BAD_REQUEST,
            AlertError::GeocodingUnavailable { .. }
            | AlertError::UpstreamFetch(_)
            | AlertError::NotificationsFetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AlertError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// What the client sees.
    pub fn public_message(&self) -> &'static str {
        match self {
            AlertError::Validation(v) => v.message(),
            AlertError::GeocodingUnavailable { .. } => MSG_GEOCODING_FAILED,
            AlertError::UpstreamFetch(_) => MSG_ALERT_FEED_FAILED,
            AlertError::NotificationsFetch(_) => MSG_NOTIFICATIONS_FAILED,
            AlertError::RateLimited => MSG_RATE_LIMITED,
        }
    }
}

impl From<ValidationError> for AlertError {
    fn from(v: ValidationError) -> Self {
        AlertError::Validation(v)
    }
}

impl IntoResponse for AlertError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.public_message())
    }
}

/// `{"error": "..."}` with the given status.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
