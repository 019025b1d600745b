//! The typed event set the bus carries.
//!
//! Delivery is at-least-once: every payload carries the
//! `(code_id, occurrence_local_date)` pair that consumers use to
//! deduplicate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use wecker_core::temporal::ClockTime;

use crate::topics;

/// Everything that travels over the bus. The variant fixes the routing
/// topic, so a producer cannot publish an event under the wrong one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    AlarmTriggered(AlarmTriggered),
    EmailRequest(EmailRequest),
}

impl Event {
    /// The PUB/SUB topic this event is routed under.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::AlarmTriggered(_) => topics::ALARM_TRIGGERED,
            Self::EmailRequest(_) => topics::EMAIL_REQUEST,
        }
    }
}

/// Emitted on [`topics::ALARM_TRIGGERED`] when an alarm occurrence is
/// claimed and fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmTriggered {
    /// The alarm's opaque textual key.
    pub code_id: String,
    /// Routing address for downstream delivery.
    pub email: String,
    /// The instant the firing replica claimed the occurrence.
    pub fired_at_utc: DateTime<Utc>,
    /// The occurrence date as observed in the alarm's own timezone.
    pub occurrence_local_date: NaiveDate,
    /// IANA zone name the alarm was defined in.
    pub timezone: String,
    /// The user's wall-clock time, unchanged from creation.
    pub local_time: ClockTime,
}

impl AlarmTriggered {
    /// Consumer-side deduplication key for at-least-once delivery.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.code_id, self.occurrence_local_date)
    }
}

/// Emitted on [`topics::EMAIL_REQUEST`] once a trigger has been
/// enriched with its code description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub to_email: String,
    pub code_id: String,
    /// Human-readable description for the mail body.
    pub description: String,
    /// The user's local wall-clock time, for display.
    pub alarm_time: ClockTime,
    pub timezone: String,
    /// Carried through from the trigger so email consumers can dedup too.
    pub occurrence_local_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_trigger() -> AlarmTriggered {
        AlarmTriggered {
            code_id: "A1".into(),
            email: "user@example.com".into(),
            fired_at_utc: Utc.with_ymd_and_hms(2025, 1, 15, 17, 0, 0).unwrap(),
            occurrence_local_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            timezone: "America/Los_Angeles".into(),
            local_time: "09:00:00".parse().unwrap(),
        }
    }

    fn sample_email_request() -> EmailRequest {
        EmailRequest {
            to_email: "user@example.com".into(),
            code_id: "A1".into(),
            description: "Morning alarm".into(),
            alarm_time: "09:00:00".parse().unwrap(),
            timezone: "America/Los_Angeles".into(),
            occurrence_local_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        }
    }

    #[test]
    fn topic_is_fixed_by_variant() {
        assert_eq!(
            Event::AlarmTriggered(sample_trigger()).topic(),
            topics::ALARM_TRIGGERED
        );
        assert_eq!(
            Event::EmailRequest(sample_email_request()).topic(),
            topics::EMAIL_REQUEST
        );
    }

    #[test]
    fn trigger_event_json_contract() {
        // The JSON rendering is an external contract; field names and
        // formats must not drift.
        let value = serde_json::to_value(sample_trigger()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "code_id": "A1",
                "email": "user@example.com",
                "fired_at_utc": "2025-01-15T17:00:00Z",
                "occurrence_local_date": "2025-01-15",
                "timezone": "America/Los_Angeles",
                "local_time": "09:00:00",
            })
        );
    }

    #[test]
    fn dedup_key_is_per_occurrence() {
        let a = sample_trigger();
        let mut b = sample_trigger();
        assert_eq!(a.dedup_key(), b.dedup_key());
        b.occurrence_local_date = NaiveDate::from_ymd_opt(2025, 1, 16).unwrap();
        assert_ne!(a.dedup_key(), b.dedup_key());
    }
}
