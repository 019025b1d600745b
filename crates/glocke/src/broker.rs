use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use zeromq::prelude::*;
use zeromq::{PubSocket, RepSocket, SubSocket, ZmqMessage};

use crate::endpoint::Endpoint;
use crate::error::GlockeError;

/// Metrics collected by the broker during message proxying.
#[derive(Debug)]
pub struct BrokerMetrics {
    /// Total messages forwarded through the proxy.
    pub total_messages: AtomicU64,
    /// Per-topic message counts.
    pub topic_counts: Mutex<HashMap<String, u64>>,
}

impl BrokerMetrics {
    fn new() -> Self {
        Self {
            total_messages: AtomicU64::new(0),
            topic_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of total forwarded messages.
    pub fn total(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }
}

/// Configuration for the event broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Frontend endpoint where publishers connect (broker binds SUB here).
    pub frontend: Endpoint,
    /// Backend endpoint where subscribers connect (broker binds PUB here).
    pub backend: Endpoint,
    /// Health check endpoint (REP socket for liveness probes).
    pub health: Endpoint,
}

impl BrokerConfig {
    /// Create a local IPC broker configuration.
    pub fn local() -> Self {
        Self {
            frontend: Endpoint::ipc("broker-frontend"),
            backend: Endpoint::ipc("broker-backend"),
            health: Endpoint::ipc("broker-health"),
        }
    }

    /// Create a TCP broker configuration.
    pub fn tcp(host: &str, frontend_port: u16, backend_port: u16, health_port: u16) -> Self {
        Self {
            frontend: Endpoint::tcp(host, frontend_port),
            backend: Endpoint::tcp(host, backend_port),
            health: Endpoint::tcp(host, health_port),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::local()
    }
}

/// Central PUB/SUB event broker.
///
/// The broker acts as a rendezvous point so publishers and subscribers
/// only need to know one address each:
/// - Publishers connect to the **frontend** (SUB socket the broker binds).
/// - Subscribers connect to the **backend** (PUB socket the broker binds).
/// - Messages received on frontend are forwarded to backend unchanged.
///
/// Since `zeromq` 0.4 does not provide XPUB/XSUB socket types, the
/// proxy pattern is emulated with PUB+SUB; the broker subscribes to
/// all topics ("").
pub struct EventBroker {
    config: BrokerConfig,
    metrics: Arc<BrokerMetrics>,
    shutdown: Arc<AtomicBool>,
}

impl EventBroker {
    /// Create a new broker with the given configuration.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(BrokerMetrics::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Access the broker's metrics counters.
    pub fn metrics(&self) -> &Arc<BrokerMetrics> {
        &self.metrics
    }

    /// Signal the broker to shut down gracefully.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run the broker proxy loop.
    ///
    /// Binds three sockets:
    /// 1. SUB (frontend) — receives from publishers, subscribed to all topics.
    /// 2. PUB (backend) — forwards to subscribers.
    /// 3. REP (health) — responds to liveness pings with "ok".
    ///
    /// Returns when shutdown is signaled or an unrecoverable bind error occurs.
    pub async fn run(&self) -> Result<(), GlockeError> {
        for endpoint in [
            &self.config.frontend,
            &self.config.backend,
            &self.config.health,
        ] {
            endpoint
                .prepare()
                .map_err(|e| GlockeError::Transport(e.to_string()))?;
        }

        let mut frontend = SubSocket::new();
        frontend.bind(self.config.frontend.as_zmq()).await?;
        frontend.subscribe("").await?;
        tracing::info!(
            endpoint = %self.config.frontend,
            "broker frontend (SUB) bound — publishers connect here"
        );

        let mut backend = PubSocket::new();
        backend.bind(self.config.backend.as_zmq()).await?;
        tracing::info!(
            endpoint = %self.config.backend,
            "broker backend (PUB) bound — subscribers connect here"
        );

        let mut health = RepSocket::new();
        health.bind(self.config.health.as_zmq()).await?;
        tracing::info!(
            endpoint = %self.config.health,
            "broker health check (REP) bound"
        );

        let shutdown_flag = self.shutdown.clone();
        tokio::spawn(async move {
            Self::health_loop(&mut health, &shutdown_flag).await;
        });

        let metrics = self.metrics.clone();
        let shutdown = self.shutdown.clone();

        tracing::info!("broker proxy loop started");

        loop {
            if shutdown.load(Ordering::SeqCst) {
                tracing::info!("broker shutting down");
                break;
            }

            // Timeout so the shutdown flag is checked periodically.
            let recv_result =
                tokio::time::timeout(std::time::Duration::from_millis(100), frontend.recv()).await;

            let msg = match recv_result {
                Ok(Ok(msg)) => msg,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "frontend recv error");
                    continue;
                }
                Err(_) => continue,
            };

            let topic = extract_topic(&msg);

            metrics.total_messages.fetch_add(1, Ordering::Relaxed);
            {
                let mut counts = metrics.topic_counts.lock().await;
                *counts.entry(topic.clone()).or_insert(0) += 1;
            }

            tracing::debug!(
                topic = %topic,
                total = metrics.total_messages.load(Ordering::Relaxed),
                "forwarding message"
            );

            if let Err(e) = backend.send(msg).await {
                tracing::warn!(error = %e, "backend send error");
            }
        }

        Ok(())
    }

    /// Respond "ok" to liveness pings until shutdown.
    async fn health_loop(health: &mut RepSocket, shutdown: &AtomicBool) {
        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            let recv =
                tokio::time::timeout(std::time::Duration::from_millis(200), health.recv()).await;
            match recv {
                Ok(Ok(_)) => {
                    if let Err(e) = health.send(ZmqMessage::from("ok")).await {
                        tracing::warn!(error = %e, "health reply failed");
                    }
                }
                Ok(Err(e)) => tracing::warn!(error = %e, "health recv error"),
                Err(_) => {}
            }
        }
    }
}

/// Extract the topic (first frame) from a raw ZMQ message.
fn extract_topic(msg: &ZmqMessage) -> String {
    msg.iter()
        .next()
        .map(|frame| String::from_utf8_lossy(frame.as_ref()).into_owned())
        .unwrap_or_else(|| "<empty>".to_string())
}
