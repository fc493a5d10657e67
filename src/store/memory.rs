//! In-memory implementation of the message store.
//!
//! Keeps records in a `Vec` behind a mutex. Primarily used as a test double
//! for the listener and in development setups where durability does not
//! matter; the aggregation semantics match the SQLite backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::message::StoredMessage;
use crate::statistics::{MetricsPerMessageType, Statistics};

use super::MessageStore;

#[derive(Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn records(&self) -> Vec<StoredMessage> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredMessage>> {
        self.messages.lock().expect("message store lock poisoned")
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn save(&self, message: &mut StoredMessage) -> Result<(), Error> {
        let mut messages = self.lock();
        message.set_id(messages.len() as i64 + 1);
        messages.push(message.clone());
        Ok(())
    }

    async fn update(&self, message: &StoredMessage) -> Result<(), Error> {
        let Some(id) = message.id() else {
            return Err(Error::precondition(
                "cannot update a stored message that was never saved",
            ));
        };

        let mut messages = self.lock();
        let Some(slot) = messages.iter_mut().find(|m| m.id() == Some(id)) else {
            return Err(Error::UnknownId { id });
        };

        *slot = message.clone();
        Ok(())
    }

    async fn find_latest_by_token(&self, token: &str) -> Result<Option<StoredMessage>, Error> {
        let messages = self.lock();

        Ok(messages
            .iter()
            .filter(|m| m.message_uid() == token)
            .max_by_key(|m| (m.dispatched_at(), m.id()))
            .cloned())
    }

    async fn aggregate(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Statistics, Error> {
        let messages = self.lock();

        let mut groups: BTreeMap<&str, Vec<&StoredMessage>> = BTreeMap::new();
        for message in messages
            .iter()
            .filter(|m| m.dispatched_at() >= from && m.dispatched_at() <= to)
        {
            groups.entry(message.message_class()).or_default().push(message);
        }

        let mut statistics = Statistics::new(from, to);

        for (class, group) in groups {
            statistics.add(MetricsPerMessageType::new(
                from,
                to,
                class,
                group.len() as i64,
                average(group.iter().filter_map(|m| m.waiting_time())),
                average(group.iter().filter_map(|m| m.handling_time())),
            ));
        }

        Ok(statistics)
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;

    for value in values {
        sum += value;
        count += 1;
    }

    (count > 0).then(|| sum / count as f64)
}
