//! Publisher and subscriber seams over the typed event set.
//!
//! The controller and the workers program against these traits, not
//! against ZeroMQ — tests substitute in-memory fakes, and both sides
//! only ever see [`Envelope`]s, never raw frames.

use async_trait::async_trait;

use crate::envelope::Envelope;
use crate::error::GlockeError;

/// Broadcast side of the fanout: delivers a typed envelope to every
/// subscriber whose filter matches the envelope's topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: Envelope) -> Result<(), GlockeError>;
}

/// Receive side: a tail-follow stream of envelopes whose topics match
/// the subscribed prefixes.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Add a topic-prefix filter. An empty prefix matches everything;
    /// multiple filters can be active at once.
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), GlockeError>;

    /// The next matching envelope. Blocks until one arrives.
    async fn recv(&self) -> Result<Envelope, GlockeError>;
}
