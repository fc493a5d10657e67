//! Message envelope seen by the monitor.
//!
//! The monitor never inspects payloads. It only needs the logical class name
//! of the message and the out-of-band key-value metadata the transport
//! carries next to the body, which is where the monitor stamp travels.
//! Hosts map their own envelope type onto this one on both the dispatch and
//! the worker side.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::stamp::MonitorStamp;

/// Metadata key under which the monitor stamp token travels.
pub const MONITOR_STAMP_KEY: &str = "pulsemq-monitor-id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    message_class: String,

    /// Delivery delay requested at dispatch time, if any. Subtracted from
    /// the measured wait so intentionally delayed messages do not report an
    /// inflated waiting time.
    delay_seconds: Option<u64>,

    /// Arbitrary key-value pairs carried alongside the message body.
    kv: HashMap<String, String>,
}

impl Envelope {
    pub fn new(message_class: impl Into<String>) -> Self {
        Self {
            message_class: message_class.into(),
            delay_seconds: None,
            kv: HashMap::new(),
        }
    }

    pub fn with_delay(mut self, delay_seconds: u64) -> Self {
        self.delay_seconds = Some(delay_seconds);
        self
    }

    pub fn message_class(&self) -> &str {
        &self.message_class
    }

    pub fn delay_seconds(&self) -> Option<u64> {
        self.delay_seconds
    }

    pub fn kv(&self) -> &HashMap<String, String> {
        &self.kv
    }

    pub fn insert_kv(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.kv.insert(key.into(), value.into());
    }

    pub fn get_kv(&self, key: &str) -> Option<&str> {
        self.kv.get(key).map(|s| s.as_str())
    }

    /// Attaches the monitor stamp under [`MONITOR_STAMP_KEY`].
    pub fn attach_stamp(&mut self, stamp: &MonitorStamp) {
        self.kv
            .insert(MONITOR_STAMP_KEY.to_owned(), stamp.id().to_owned());
    }

    /// Reads the monitor stamp back out of the metadata, if present.
    pub fn stamp(&self) -> Option<MonitorStamp> {
        self.get_kv(MONITOR_STAMP_KEY).map(MonitorStamp::from_token)
    }
}
