// src/service.rs
//! Live alert lookup: coordinate → city → upstream feed → items for that city.

use std::sync::Arc;

use serde_json::json;

use crate::city;
use crate::error::AlertError;
use crate::feed::AlertFeed;
use crate::geocode::GeocodeCache;
use crate::logging::{DynSink, Level};
use crate::models::{AlertItem, Coordinate};

pub struct AlertFilterService {
    geocode: Arc<GeocodeCache>,
    feed: Arc<dyn AlertFeed>,
    sink: DynSink,
}

impl AlertFilterService {
    pub fn new(geocode: Arc<GeocodeCache>, feed: Arc<dyn AlertFeed>, sink: DynSink) -> Self {
        Self { geocode, feed, sink }
    }

    /// Alerts whose header names the city at `coord`, in feed order.
    ///
    /// An empty result is a normal outcome. The feed is hit exactly once.
    pub async fn relevant_alerts(&self, coord: Coordinate) -> Result<Vec<AlertItem>, AlertError> {
        let Some(user_city) = self.geocode.resolve(coord).await else {
            self.sink.record(
                Level::Info,
                "Geocoding failed",
                json!({
                    "endpoint": "/alerts",
                    "status": 500,
                    "details": format!("Could not determine city for lat={}, lon={}", coord.lat, coord.lon),
                }),
            );
            return Err(AlertError::GeocodingUnavailable {
                lat: coord.lat,
                lon: coord.lon,
            });
        };

        let items = match self.feed.fetch_items().await {
            Ok(items) => items,
            Err(e) => {
                self.sink.record(
                    Level::Error,
                    "Error fetching data from Pikud HaOref API",
                    json!({
                        "endpoint": "/alerts",
                        "feed": self.feed.name(),
                        "error": format!("{e:#}"),
                    }),
                );
                return Err(AlertError::UpstreamFetch(e));
            }
        };

        let relevant = filter_for_city(items, &user_city);

        if relevant.is_empty() {
            self.sink.record(
                Level::Info,
                "No missile alerts for the user's city",
                json!({ "endpoint": "/alerts", "userCity": user_city }),
            );
        } else {
            self.sink.record(
                Level::Info,
                "Missile alerts found for city",
                json!({ "endpoint": "/alerts", "userCity": user_city, "data": relevant }),
            );
        }

        Ok(relevant)
    }
}

/// Keep items whose header names `city`; order is preserved.
pub fn filter_for_city(items: Vec<AlertItem>, city: &str) -> Vec<AlertItem> {
    items
        .into_iter()
        .filter(|it| city::header_matches(&it.header, city))
        .collect()
}
