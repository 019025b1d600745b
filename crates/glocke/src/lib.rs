//! glocke — the wecker event bus.
//!
//! ZeroMQ PUB/SUB fanout through a central broker. The bus carries the
//! alarm domain's [`Event`] set — not opaque byte blobs — wrapped in an
//! [`Envelope`] whose routing topic is fixed by the event type.
//! Delivery is at-least-once, so consumers deduplicate on the
//! `(code_id, occurrence_local_date)` pair carried in every event.

pub mod broker;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod events;
pub mod pubsub;
pub mod retry;
pub mod topics;
pub mod traits;

pub use endpoint::Endpoint;
pub use envelope::Envelope;
pub use error::GlockeError;
pub use events::{AlarmTriggered, EmailRequest, Event};
pub use pubsub::{ZmqPublisher, ZmqSubscriber};
pub use retry::{publish_with_retry, RetryPolicy};
pub use traits::{EventPublisher, EventSubscriber};
