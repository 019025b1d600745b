//! Topic constants for PUB/SUB routing.
//!
//! These names are part of the external contract — downstream
//! consumers subscribe to them by prefix — so they are bare, not
//! namespace-prefixed. Producers never pass them directly: the topic
//! of an outgoing envelope is derived from its [`Event`](crate::Event)
//! variant.

/// Fired exactly once per claimed alarm occurrence.
pub const ALARM_TRIGGERED: &str = "alarm.triggered";

/// Request for the email delivery worker, derived from a trigger.
pub const EMAIL_REQUEST: &str = "email.request";
