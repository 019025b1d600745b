//! Typed wire envelope for bus events.
//!
//! An envelope wraps a domain [`Event`] — never an opaque byte blob —
//! so the routing topic comes from the event itself and cannot
//! disagree with the payload. On the wire an envelope is a two-frame
//! ZMQ message: the topic string (for subscriber prefix filtering)
//! followed by the MessagePack-encoded envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeromq::ZmqMessage;

use crate::error::GlockeError;
use crate::events::Event;

/// Current envelope schema version, stamped on every publish.
pub const SCHEMA_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The domain event; its variant fixes the routing topic.
    pub event: Event,

    /// When this envelope was created.
    pub published_at: DateTime<Utc>,

    /// Correlation ID for tracking one occurrence through fanout,
    /// retries, and derived events.
    pub correlation_id: Uuid,

    /// Schema version for forward-compatible evolution. Consumers
    /// should check this before acting on the event.
    pub version: u16,
}

impl Envelope {
    /// Wrap an event with a fresh correlation id.
    pub fn new(event: Event) -> Self {
        Self::with_correlation(event, Uuid::new_v4())
    }

    /// Wrap an event derived from another one (e.g. the email request
    /// produced by a trigger), keeping that event's correlation id.
    pub fn with_correlation(event: Event, correlation_id: Uuid) -> Self {
        Self {
            event,
            published_at: Utc::now(),
            correlation_id,
            version: SCHEMA_VERSION,
        }
    }

    /// The routing topic, fixed by the event variant.
    pub fn topic(&self) -> &'static str {
        self.event.topic()
    }

    /// Build the two-frame ZMQ message: [topic, envelope].
    pub fn to_zmq(&self) -> Result<ZmqMessage, GlockeError> {
        let mut msg = ZmqMessage::from(self.topic());
        msg.push_back(rmp_serde::to_vec(self)?.into());
        Ok(msg)
    }

    /// Parse an envelope off the wire. Accepts the two-frame form and,
    /// leniently, a bare single-frame envelope.
    pub fn from_zmq(msg: &ZmqMessage) -> Result<Self, GlockeError> {
        let frames: Vec<_> = msg.iter().collect();
        let body = match frames.len() {
            0 => return Err(GlockeError::Transport("empty ZMQ message".into())),
            1 => frames[0].as_ref(),
            _ => frames[1].as_ref(),
        };
        Ok(rmp_serde::from_slice(body)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use crate::events::AlarmTriggered;
    use crate::topics;

    use super::*;

    fn trigger(code_id: &str) -> Event {
        Event::AlarmTriggered(AlarmTriggered {
            code_id: code_id.into(),
            email: "user@example.com".into(),
            fired_at_utc: Utc.with_ymd_and_hms(2025, 1, 15, 17, 0, 0).unwrap(),
            occurrence_local_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            timezone: "America/Los_Angeles".into(),
            local_time: "09:00:00".parse().unwrap(),
        })
    }

    #[test]
    fn topic_comes_from_the_event() {
        let envelope = Envelope::new(trigger("A1"));
        assert_eq!(envelope.topic(), topics::ALARM_TRIGGERED);
        assert_eq!(envelope.version, SCHEMA_VERSION);
    }

    #[test]
    fn wire_roundtrip_preserves_event_and_correlation() {
        let envelope = Envelope::new(trigger("A1"));
        let correlation_id = envelope.correlation_id;

        let msg = envelope.to_zmq().unwrap();
        let frames: Vec<_> = msg.iter().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), topics::ALARM_TRIGGERED.as_bytes());

        let decoded = Envelope::from_zmq(&msg).unwrap();
        assert_eq!(decoded.correlation_id, correlation_id);
        match decoded.event {
            Event::AlarmTriggered(e) => assert_eq!(e.code_id, "A1"),
            other => panic!("wrong event variant: {other:?}"),
        }
    }

    #[test]
    fn with_correlation_preserves_id() {
        let id = Uuid::new_v4();
        let envelope = Envelope::with_correlation(trigger("A1"), id);
        assert_eq!(envelope.correlation_id, id);
    }
}
