// src/mock.rs
//! Mock alert emission for exercising client polling without a live feed.
//!
//! A [`TriggerCounter`] counts calls and fires once the count reaches a randomly
//! drawn threshold, then starts over with a fresh threshold. Count, compare and
//! reset happen under one lock, so concurrent callers are serialized.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use metrics::counter;
use rand::Rng;
use serde_json::json;

use crate::logging::{DynSink, Level};
use crate::models::{utc_date_string, AlertItem, MockAlertResponse, Notification};
use crate::service::filter_for_city;

/// Trigger range for the city-filtered alerts mock.
pub const ALERTS_THRESHOLD_RANGE: RangeInclusive<u32> = 2..=3;
/// Trigger range for the city-agnostic notifications mock.
pub const NOTIFICATIONS_THRESHOLD_RANGE: RangeInclusive<u32> = 1..=5;

pub trait ThresholdSource: Send + Sync {
    fn draw(&self, range: &RangeInclusive<u32>) -> u32;
}

/// Uniform draw from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomThreshold;

impl ThresholdSource for RandomThreshold {
    fn draw(&self, range: &RangeInclusive<u32>) -> u32 {
        rand::rng().random_range(range.clone())
    }
}

/// Replays a fixed sequence, cycling when exhausted. Ignores the range.
#[derive(Debug)]
pub struct FixedThresholds {
    seq: Mutex<VecDeque<u32>>,
}

impl FixedThresholds {
    pub fn new(seq: impl IntoIterator<Item = u32>) -> Self {
        Self {
            seq: Mutex::new(seq.into_iter().collect()),
        }
    }
}

impl ThresholdSource for FixedThresholds {
    fn draw(&self, range: &RangeInclusive<u32>) -> u32 {
        let mut q = self.seq.lock().unwrap_or_else(|p| p.into_inner());
        match q.pop_front() {
            Some(v) => {
                q.push_back(v);
                v
            }
            None => *range.start(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Threshold reached after `after` calls; state has been reset.
    Triggered { after: u32 },
    Pending { count: u32, remaining: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorState {
    pub count: u32,
    pub threshold: u32,
}

pub struct TriggerCounter {
    state: Mutex<SimulatorState>,
    range: RangeInclusive<u32>,
    source: Arc<dyn ThresholdSource>,
}

impl TriggerCounter {
    pub fn new(range: RangeInclusive<u32>, source: Arc<dyn ThresholdSource>) -> Self {
        let threshold = source.draw(&range).max(1);
        Self {
            state: Mutex::new(SimulatorState {
                count: 0,
                threshold,
            }),
            range,
            source,
        }
    }

    /// Count one call and evaluate it in the same critical section.
    pub fn tick(&self) -> Tick {
        let mut st = self.state.lock().unwrap_or_else(|p| p.into_inner());
        st.count += 1;
        self.evaluate(&mut st)
    }

    /// Count a call without evaluating it. Pair with [`TriggerCounter::settle`].
    pub fn advance(&self) {
        let mut st = self.state.lock().unwrap_or_else(|p| p.into_inner());
        st.count += 1;
    }

    /// Evaluate the current count, resetting on trigger.
    pub fn settle(&self) -> Tick {
        let mut st = self.state.lock().unwrap_or_else(|p| p.into_inner());
        self.evaluate(&mut st)
    }

    fn evaluate(&self, st: &mut SimulatorState) -> Tick {
        if st.count >= st.threshold {
            let after = st.count;
            st.count = 0;
            st.threshold = self.source.draw(&self.range).max(1);
            Tick::Triggered { after }
        } else {
            Tick::Pending {
                count: st.count,
                remaining: st.threshold - st.count,
            }
        }
    }

    pub fn state(&self) -> SimulatorState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// `/mock-alerts` backend: canned alerts, optionally narrowed to one city.
pub struct MockAlertSimulator {
    counter: TriggerCounter,
    fixtures: Vec<AlertItem>,
    sink: DynSink,
}

impl MockAlertSimulator {
    pub fn new(source: Arc<dyn ThresholdSource>, sink: DynSink) -> Self {
        Self::with_fixtures(source, sink, alert_fixtures())
    }

    pub fn with_fixtures(
        source: Arc<dyn ThresholdSource>,
        sink: DynSink,
        fixtures: Vec<AlertItem>,
    ) -> Self {
        Self {
            counter: TriggerCounter::new(ALERTS_THRESHOLD_RANGE, source),
            fixtures,
            sink,
        }
    }

    /// One polling call. `city = None` returns the full fixture set on trigger.
    pub fn invoke(&self, city: Option<&str>) -> MockAlertResponse {
        self.render(self.counter.tick(), city)
    }

    /// Count a request that may still be rejected before it reaches [`respond`].
    ///
    /// [`respond`]: MockAlertSimulator::respond
    pub fn record_call(&self) {
        self.counter.advance();
    }

    /// Answer a request already counted with [`MockAlertSimulator::record_call`].
    pub fn respond(&self, city: Option<&str>) -> MockAlertResponse {
        self.render(self.counter.settle(), city)
    }

    fn render(&self, tick: Tick, city: Option<&str>) -> MockAlertResponse {
        let date = utc_date_string(Utc::now());
        match tick {
            Tick::Triggered { after } => {
                let items = match city {
                    Some(c) => filter_for_city(self.fixtures.clone(), c),
                    None => self.fixtures.clone(),
                };
                let resp = MockAlertResponse {
                    date,
                    status: 1,
                    items,
                };
                counter!("mock_alert_triggers_total").increment(1);
                self.sink.record(
                    Level::Info,
                    "Triggered mock missile alert",
                    json!({
                        "endpoint": "/mock-alerts",
                        "status": 200,
                        "message": format!(
                            "Triggered mock missile alert for city: {} after {} calls",
                            city.unwrap_or("*"),
                            after
                        ),
                        "data": resp,
                    }),
                );
                resp
            }
            Tick::Pending { count, remaining } => {
                self.sink.record(
                    Level::Info,
                    "No missile alert triggered",
                    json!({
                        "endpoint": "/mock-alerts",
                        "callCount": count,
                        "nextTriggerIn": remaining,
                    }),
                );
                MockAlertResponse {
                    date,
                    status: 1,
                    items: Vec::new(),
                }
            }
        }
    }

    pub fn state(&self) -> SimulatorState {
        self.counter.state()
    }
}

/// `/mock-notifications` backend: city-agnostic, wider trigger range.
pub struct MockNotificationSimulator {
    counter: TriggerCounter,
    fixtures: Vec<Notification>,
    sink: DynSink,
}

impl MockNotificationSimulator {
    pub fn new(source: Arc<dyn ThresholdSource>, sink: DynSink) -> Self {
        Self {
            counter: TriggerCounter::new(NOTIFICATIONS_THRESHOLD_RANGE, source),
            fixtures: notification_fixtures(),
            sink,
        }
    }

    pub fn invoke(&self) -> Vec<Notification> {
        match self.counter.tick() {
            Tick::Triggered { after } => {
                counter!("mock_notification_triggers_total").increment(1);
                self.sink.record(
                    Level::Info,
                    "Triggered mock missile alert",
                    json!({
                        "endpoint": "/mock-notifications",
                        "status": 200,
                        "message": format!("Triggered mock missile alert after {after} calls"),
                        "data": self.fixtures,
                    }),
                );
                self.fixtures.clone()
            }
            Tick::Pending { count, remaining } => {
                self.sink.record(
                    Level::Info,
                    "No missile alert triggered",
                    json!({
                        "endpoint": "/mock-notifications",
                        "callCount": count,
                        "nextTriggerIn": remaining,
                    }),
                );
                Vec::new()
            }
        }
    }

    pub fn state(&self) -> SimulatorState {
        self.counter.state()
    }
}

fn mock_alert(id: &str, alert_id: &str, header: &str, redweb_no: &str) -> AlertItem {
    AlertItem {
        id: id.to_string(),
        alert_id: alert_id.to_string(),
        time: "2024-10-01 16:11:04".to_string(),
        category: "MissileAlert".to_string(),
        header: header.to_string(),
        text: "היכנסו למרחב המוגן ושהו בו 10 דקות".to_string(),
        ttl_seconds: "59".to_string(),
        redweb_no: redweb_no.to_string(),
        title: "ירי רקטות וטילים".to_string(),
    }
}

/// Tel Aviv and Jerusalem, in that order.
pub fn alert_fixtures() -> Vec<AlertItem> {
    vec![
        mock_alert("17849", "10010411011384", "תל אביב", "1384"),
        mock_alert("17848", "10010411011405", "ירושלים", "1405"),
    ]
}

pub fn notification_fixtures() -> Vec<Notification> {
    let n = |id: &str, time: u64, cities: &[&str]| Notification {
        notification_id: id.to_string(),
        time,
        threat: 0,
        is_drill: false,
        cities: cities.iter().map(|c| c.to_string()).collect(),
    };
    vec![
        n(
            "315de9a7-fdb5-403a-be97-58e8a18b5e56",
            1_698_668_959,
            &["בית מאיר", "נווה אילן", "שורש", "ירושלים - מערב", "אבן ספיר"],
        ),
        n(
            "6d6bd4d7-f64f-43d1-a443-cb39c36e6dd1",
            1_698_668_970,
            &["אפרת", "נווה דניאל", "ירושלים - דרום", "אורה", "עמינדב"],
        ),
    ]
}
