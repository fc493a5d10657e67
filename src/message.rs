//! Stored message records and duration derivation.
//!
//! This module defines the timing record kept for every dispatched message
//! and the rules for deriving its duration metrics.
//!
//! # Message Lifecycle
//!
//! 1. A record is created at dispatch with `dispatched_at` set
//! 2. When a worker picks the message up, `waiting_time` and `receiver_name`
//!    are recorded
//! 3. On the terminal outcome exactly one of `handling_time` (success) or
//!    `failing_time` (no further retry) is recorded
//!
//! Waiting time is measured from dispatch to receive; handling and failing
//! times are measured from the receive point, not from dispatch. A redelivered
//! message keeps its token but gets a fresh record per dispatch, so lookups
//! by token must resolve the most recent record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::Error;
use crate::utils::{round_seconds, to_epoch_seconds};

/// Timing record for one dispatch instance of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    id: Option<i64>,
    message_uid: String,
    message_class: String,
    dispatched_at: DateTime<Utc>,
    waiting_time: Option<f64>,
    receiver_name: Option<String>,
    handling_time: Option<f64>,
    failing_time: Option<f64>,
}

impl StoredMessage {
    /// Creates the record for a freshly dispatched message. The storage id
    /// stays unset until the record is first saved.
    pub fn new(
        message_uid: impl Into<String>,
        message_class: impl Into<String>,
        dispatched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            message_uid: message_uid.into(),
            message_class: message_class.into(),
            dispatched_at,
            waiting_time: None,
            receiver_name: None,
            handling_time: None,
            failing_time: None,
        }
    }

    /// Creates the record for an outgoing envelope, taking the token from
    /// its monitor stamp.
    pub fn from_envelope(envelope: &Envelope, dispatched_at: DateTime<Utc>) -> Result<Self, Error> {
        let stamp = envelope.stamp().ok_or(Error::StampMissing)?;

        Ok(Self::new(
            stamp.id(),
            envelope.message_class(),
            dispatched_at,
        ))
    }

    /// Rebuilds a record from its stored columns.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn hydrate(
        id: i64,
        message_uid: String,
        message_class: String,
        dispatched_at: DateTime<Utc>,
        waiting_time: Option<f64>,
        receiver_name: Option<String>,
        handling_time: Option<f64>,
        failing_time: Option<f64>,
    ) -> Self {
        Self {
            id: Some(id),
            message_uid,
            message_class,
            dispatched_at,
            waiting_time,
            receiver_name,
            handling_time,
            failing_time,
        }
    }

    /// Records the moment a worker picked the message up.
    ///
    /// Sets `waiting_time` to the seconds elapsed since dispatch, minus any
    /// delivery delay that was requested on purpose. Fails if the message
    /// was already received; the receive event must be applied exactly once.
    pub fn mark_received(
        &mut self,
        now: DateTime<Utc>,
        receiver_name: impl Into<String>,
        delay: Option<Duration>,
    ) -> Result<(), Error> {
        if self.waiting_time.is_some() {
            return Err(Error::precondition(
                "waiting time is already recorded for this message",
            ));
        }

        let mut elapsed = to_epoch_seconds(now) - to_epoch_seconds(self.dispatched_at);
        if let Some(delay) = delay {
            elapsed -= delay.num_milliseconds() as f64 / 1_000.0;
        }

        self.waiting_time = Some(round_seconds(elapsed));
        self.receiver_name = Some(receiver_name.into());

        Ok(())
    }

    /// Records a successful terminal outcome.
    ///
    /// `handling_time` is the seconds between the receive point and `now`,
    /// derived as total-elapsed minus `waiting_time`.
    pub fn mark_handled(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        let waiting_time = self.require_open_for_terminal("handling")?;

        let elapsed = to_epoch_seconds(now) - to_epoch_seconds(self.dispatched_at);
        self.handling_time = Some(round_seconds(elapsed - waiting_time));

        Ok(())
    }

    /// Records a terminal failure (no further retry planned).
    pub fn mark_failed(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        let waiting_time = self.require_open_for_terminal("failing")?;

        let elapsed = to_epoch_seconds(now) - to_epoch_seconds(self.dispatched_at);
        self.failing_time = Some(round_seconds(elapsed - waiting_time));

        Ok(())
    }

    /// A terminal duration requires a receive point to measure from, and a
    /// record accepts only one terminal outcome.
    fn require_open_for_terminal(&self, which: &str) -> Result<f64, Error> {
        let Some(waiting_time) = self.waiting_time else {
            return Err(Error::precondition(format!(
                "{which} time requires waiting time to be recorded first"
            )));
        };

        if self.handling_time.is_some() || self.failing_time.is_some() {
            return Err(Error::precondition(
                "message already reached a terminal outcome",
            ));
        }

        Ok(waiting_time)
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn message_uid(&self) -> &str {
        &self.message_uid
    }

    pub fn message_class(&self) -> &str {
        &self.message_class
    }

    pub fn dispatched_at(&self) -> DateTime<Utc> {
        self.dispatched_at
    }

    pub fn waiting_time(&self) -> Option<f64> {
        self.waiting_time
    }

    pub fn receiver_name(&self) -> Option<&str> {
        self.receiver_name.as_deref()
    }

    pub fn handling_time(&self) -> Option<f64> {
        self.handling_time
    }

    pub fn failing_time(&self) -> Option<f64> {
        self.failing_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stamp::MonitorStamp;
    use chrono::TimeZone;

    fn dispatch_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn waiting_time_measures_dispatch_to_receive() {
        let mut message = StoredMessage::new("uid", "OrderCreated", dispatch_instant());

        message
            .mark_received(
                dispatch_instant() + Duration::milliseconds(1123),
                "async_worker",
                None,
            )
            .unwrap();

        assert_eq!(message.waiting_time(), Some(1.123));
        assert_eq!(message.receiver_name(), Some("async_worker"));
    }

    #[test]
    fn handling_time_measures_receive_to_completion() {
        let mut message = StoredMessage::new("uid", "OrderCreated", dispatch_instant());

        message
            .mark_received(
                dispatch_instant() + Duration::milliseconds(1123),
                "async_worker",
                None,
            )
            .unwrap();
        message
            .mark_handled(dispatch_instant() + Duration::milliseconds(2123))
            .unwrap();

        assert_eq!(message.handling_time(), Some(1.0));
        assert_eq!(message.failing_time(), None);
    }

    #[test]
    fn failing_time_measures_receive_to_failure() {
        let mut message = StoredMessage::new("uid", "OrderCreated", dispatch_instant());

        message
            .mark_received(
                dispatch_instant() + Duration::milliseconds(500),
                "async_worker",
                None,
            )
            .unwrap();
        message
            .mark_failed(dispatch_instant() + Duration::milliseconds(2750))
            .unwrap();

        assert_eq!(message.failing_time(), Some(2.25));
        assert_eq!(message.handling_time(), None);
    }

    #[test]
    fn requested_delay_is_excluded_from_waiting_time() {
        let mut message = StoredMessage::new("uid", "OrderCreated", dispatch_instant());

        message
            .mark_received(
                dispatch_instant() + Duration::milliseconds(6500),
                "async_worker",
                Some(Duration::seconds(5)),
            )
            .unwrap();

        assert_eq!(message.waiting_time(), Some(1.5));
    }

    #[test]
    fn receive_is_applied_exactly_once() {
        let mut message = StoredMessage::new("uid", "OrderCreated", dispatch_instant());

        message
            .mark_received(dispatch_instant() + Duration::seconds(1), "worker", None)
            .unwrap();

        let err = message
            .mark_received(dispatch_instant() + Duration::seconds(2), "worker", None)
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn terminal_outcomes_require_a_receive_point() {
        let mut message = StoredMessage::new("uid", "OrderCreated", dispatch_instant());

        let err = message
            .mark_handled(dispatch_instant() + Duration::seconds(1))
            .unwrap_err();
        assert!(err.is_precondition());

        let err = message
            .mark_failed(dispatch_instant() + Duration::seconds(1))
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn only_one_terminal_outcome_is_accepted() {
        let mut message = StoredMessage::new("uid", "OrderCreated", dispatch_instant());

        message
            .mark_received(dispatch_instant() + Duration::seconds(1), "worker", None)
            .unwrap();
        message
            .mark_handled(dispatch_instant() + Duration::seconds(2))
            .unwrap();

        let err = message
            .mark_failed(dispatch_instant() + Duration::seconds(3))
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn durations_are_rounded_to_microseconds() {
        let mut message = StoredMessage::new("uid", "OrderCreated", dispatch_instant());

        message
            .mark_received(
                dispatch_instant() + Duration::microseconds(1_123_456),
                "worker",
                None,
            )
            .unwrap();
        message
            .mark_handled(dispatch_instant() + Duration::microseconds(2_246_912))
            .unwrap();

        assert_eq!(message.waiting_time(), Some(1.123_456));
        assert_eq!(message.handling_time(), Some(1.123_456));
    }

    #[test]
    fn from_envelope_takes_token_and_class() {
        let mut envelope = Envelope::new("OrderCreated");
        let stamp = MonitorStamp::mint();
        envelope.attach_stamp(&stamp);

        let message = StoredMessage::from_envelope(&envelope, dispatch_instant()).unwrap();

        assert_eq!(message.message_uid(), stamp.id());
        assert_eq!(message.message_class(), "OrderCreated");
        assert_eq!(message.id(), None);
    }

    #[test]
    fn from_envelope_requires_a_stamp() {
        let envelope = Envelope::new("OrderCreated");

        let err = StoredMessage::from_envelope(&envelope, dispatch_instant()).unwrap_err();
        assert!(matches!(err, Error::StampMissing));
    }
}
