//! ZeroMQ PUB/SUB transport for the alarm event stream.
//!
//! In normal deployment both halves connect to the broker, which owns
//! the bound sockets; `ZmqPublisher::bind` exists for direct,
//! broker-less wiring. Envelopes cross the wire in the two-frame form
//! built by [`Envelope::to_zmq`], so subscribers filter on the topic
//! frame without decoding bodies.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket};

use crate::endpoint::Endpoint;
use crate::envelope::Envelope;
use crate::error::GlockeError;
use crate::traits::{EventPublisher, EventSubscriber};

/// Publishing half of the bus.
pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
}

impl ZmqPublisher {
    /// Connect to the broker frontend.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, GlockeError> {
        let mut socket = PubSocket::new();
        socket.connect(endpoint.as_zmq()).await?;
        info!(endpoint = %endpoint, "publisher connected to broker frontend");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Bind directly, without a broker; subscribers then connect here.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self, GlockeError> {
        endpoint
            .prepare()
            .map_err(|e| GlockeError::Transport(e.to_string()))?;
        let mut socket = PubSocket::new();
        socket.bind(endpoint.as_zmq()).await?;
        info!(endpoint = %endpoint, "publisher bound");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventPublisher for ZmqPublisher {
    async fn publish(&self, envelope: Envelope) -> Result<(), GlockeError> {
        let frames = envelope.to_zmq()?;
        self.socket.lock().await.send(frames).await?;
        debug!(
            topic = %envelope.topic(),
            correlation_id = %envelope.correlation_id,
            "event published"
        );
        Ok(())
    }
}

/// Receiving half of the bus.
pub struct ZmqSubscriber {
    socket: Mutex<SubSocket>,
}

impl ZmqSubscriber {
    /// Connect to the broker backend.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, GlockeError> {
        let mut socket = SubSocket::new();
        socket.connect(endpoint.as_zmq()).await?;
        info!(endpoint = %endpoint, "subscriber connected to broker backend");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventSubscriber for ZmqSubscriber {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), GlockeError> {
        self.socket.lock().await.subscribe(topic_prefix).await?;
        info!(topic_prefix, "subscription added");
        Ok(())
    }

    async fn recv(&self) -> Result<Envelope, GlockeError> {
        let raw = self.socket.lock().await.recv().await?;
        let envelope = Envelope::from_zmq(&raw)?;
        debug!(topic = %envelope.topic(), "event received");
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::events::{AlarmTriggered, Event};

    use super::*;

    fn trigger_event() -> Event {
        Event::AlarmTriggered(AlarmTriggered {
            code_id: "A-17".into(),
            email: "user@example.com".into(),
            fired_at_utc: Utc.with_ymd_and_hms(2025, 1, 15, 17, 0, 0).unwrap(),
            occurrence_local_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            timezone: "America/Los_Angeles".into(),
            local_time: "09:00:00".parse().unwrap(),
        })
    }

    #[tokio::test]
    async fn direct_pub_sub_roundtrip() {
        // Broker-less wiring: publisher binds, subscriber connects.
        let endpoint = Endpoint::tcp("127.0.0.1", 15890);

        let publisher = ZmqPublisher::bind(&endpoint).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let subscriber = ZmqSubscriber::connect(&endpoint).await.unwrap();
        subscriber.subscribe("alarm.").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let envelope = Envelope::new(trigger_event());
        let correlation_id = envelope.correlation_id;
        publisher.publish(envelope).await.unwrap();

        let received = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            subscriber.recv(),
        )
        .await
        .expect("timed out waiting for event")
        .unwrap();

        assert_eq!(received.correlation_id, correlation_id);
        match received.event {
            Event::AlarmTriggered(e) => assert_eq!(e.code_id, "A-17"),
            other => panic!("wrong event variant: {other:?}"),
        }
    }
}
