//! Lifecycle event handlers that keep stored message records up to date.
//!
//! The host framework calls one handler per lifecycle transition. Every side
//! effect goes through the injected [`MessageStore`]; the clock is injected
//! as well so tests can drive time deterministically.
//!
//! Integrity problems (an envelope without a stamp, a token that resolves
//! to no record) are reported through `tracing` and swallowed: the host's
//! message processing must never fail because metrics could not be
//! recorded. Storage errors and lifecycle-ordering violations propagate.

use std::sync::Arc;

use crate::clock::Clock;
use crate::envelope::Envelope;
use crate::error::Error;
use crate::message::StoredMessage;
use crate::stamp::MonitorStamp;
use crate::store::MessageStore;

pub struct MonitorListener {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
}

impl MonitorListener {
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Stamps an outgoing envelope and creates its timing record.
    ///
    /// Returns the minted stamp so dispatchers can correlate logs with the
    /// stored record.
    pub async fn on_dispatch(&self, envelope: &mut Envelope) -> Result<MonitorStamp, Error> {
        let stamp = MonitorStamp::mint();
        envelope.attach_stamp(&stamp);

        let mut message = StoredMessage::from_envelope(envelope, self.clock.now())?;
        self.store.save(&mut message).await?;

        Ok(stamp)
    }

    /// Records that a worker picked the message up.
    pub async fn on_receive(&self, envelope: &Envelope, receiver_name: &str) -> Result<(), Error> {
        let Some(mut message) = self.resolve(envelope).await? else {
            return Ok(());
        };

        let delay = envelope
            .delay_seconds()
            .map(|secs| chrono::Duration::seconds(secs as i64));

        message.mark_received(self.clock.now(), receiver_name, delay)?;
        self.store.update(&message).await
    }

    /// Records a successful terminal outcome.
    pub async fn on_handled(&self, envelope: &Envelope) -> Result<(), Error> {
        let Some(mut message) = self.resolve(envelope).await? else {
            return Ok(());
        };

        message.mark_handled(self.clock.now())?;
        self.store.update(&message).await
    }

    /// Records a terminal failure.
    ///
    /// `will_retry` mirrors the host framework's retry decision: a failure
    /// that will be retried is not terminal, so the record stays open for
    /// the redelivered attempt.
    pub async fn on_failed(&self, envelope: &Envelope, will_retry: bool) -> Result<(), Error> {
        if will_retry {
            return Ok(());
        }

        let Some(mut message) = self.resolve(envelope).await? else {
            return Ok(());
        };

        message.mark_failed(self.clock.now())?;
        self.store.update(&message).await
    }

    async fn resolve(&self, envelope: &Envelope) -> Result<Option<StoredMessage>, Error> {
        let Some(stamp) = envelope.stamp() else {
            tracing::error!(
                message_class = envelope.message_class(),
                "Envelope should have a monitor stamp"
            );
            return Ok(None);
        };

        match self.store.find_latest_by_token(stamp.id()).await? {
            Some(message) => Ok(Some(message)),
            None => {
                tracing::error!("Message with uid \"{}\" not found", stamp.id());
                Ok(None)
            }
        }
    }
}
