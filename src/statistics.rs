//! Read models for per-class message metrics.
//!
//! Built by the store's aggregation query, never persisted. Each entry
//! covers one message class over the queried window; derived rates are
//! computed at read time from the window length.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::utils::round_seconds;

/// Aggregated metrics for one message class over a time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsPerMessageType {
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
    message_class: String,
    messages_count: i64,
    average_waiting_time: Option<f64>,
    average_handling_time: Option<f64>,
}

impl MetricsPerMessageType {
    pub(crate) fn new(
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        message_class: impl Into<String>,
        messages_count: i64,
        average_waiting_time: Option<f64>,
        average_handling_time: Option<f64>,
    ) -> Self {
        Self {
            from_date,
            to_date,
            message_class: message_class.into(),
            messages_count,
            average_waiting_time,
            average_handling_time,
        }
    }

    pub fn message_class(&self) -> &str {
        &self.message_class
    }

    /// Number of messages of this class dispatched within the window,
    /// including those still waiting for a terminal outcome.
    pub fn messages_count(&self) -> i64 {
        self.messages_count
    }

    /// Throughput over the window, rounded to 2 decimals. A zero-width
    /// window reports 0 rather than dividing by zero.
    pub fn messages_handled_per_hour(&self) -> f64 {
        let hours = self.hours_in_period();
        if hours == 0.0 {
            return 0.0;
        }

        (self.messages_count as f64 / hours * 100.0).round() / 100.0
    }

    /// Average seconds between dispatch and receive, rounded to
    /// microseconds. Absent when no message of this class was received yet.
    pub fn average_waiting_time(&self) -> Option<f64> {
        self.average_waiting_time.map(round_seconds)
    }

    /// Average seconds between receive and successful completion, rounded
    /// to microseconds. Absent when no message of this class was handled.
    pub fn average_handling_time(&self) -> Option<f64> {
        self.average_handling_time.map(round_seconds)
    }

    fn hours_in_period(&self) -> f64 {
        (self.to_date.timestamp() - self.from_date.timestamp()).abs() as f64 / 3600.0
    }
}

/// Metrics for every message class seen in one time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
    metrics: Vec<MetricsPerMessageType>,
}

impl Statistics {
    pub(crate) fn new(from_date: DateTime<Utc>, to_date: DateTime<Utc>) -> Self {
        Self {
            from_date,
            to_date,
            metrics: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, metrics: MetricsPerMessageType) {
        self.metrics.push(metrics);
    }

    pub fn from_date(&self) -> DateTime<Utc> {
        self.from_date
    }

    pub fn to_date(&self) -> DateTime<Utc> {
        self.to_date
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricsPerMessageType> {
        self.metrics.iter()
    }

    /// Entry for one message class, if it was seen in the window.
    pub fn for_class(&self, message_class: &str) -> Option<&MetricsPerMessageType> {
        self.metrics
            .iter()
            .find(|m| m.message_class() == message_class)
    }
}

impl<'a> IntoIterator for &'a Statistics {
    type Item = &'a MetricsPerMessageType;
    type IntoIter = std::slice::Iter<'a, MetricsPerMessageType>;

    fn into_iter(self) -> Self::IntoIter {
        self.metrics.iter()
    }
}
