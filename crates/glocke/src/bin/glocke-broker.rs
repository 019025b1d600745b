//! glocke-broker — Central PUB/SUB event broker for the wecker messaging layer.
//!
//! Proxies messages from publishers (SUB frontend) to subscribers
//! (PUB backend) while counting per-topic traffic. Provides a REP
//! health check socket.
//!
//! # Usage
//!
//! ```bash
//! # Local IPC (default)
//! glocke-broker
//!
//! # TCP with custom ports
//! glocke-broker --transport tcp --host 0.0.0.0 --frontend-port 5555 --backend-port 5556 --health-port 5557
//! ```

use std::sync::atomic::Ordering;

use clap::Parser;

use wecker_glocke::broker::{BrokerConfig, EventBroker};
use wecker_glocke::Endpoint;

/// Central PUB/SUB event broker for the glocke messaging layer.
#[derive(Parser, Debug)]
#[command(name = "glocke-broker", version, about)]
struct Cli {
    /// Transport type: "ipc" or "tcp".
    #[arg(long, env = "GLOCKE_TRANSPORT", default_value = "ipc")]
    transport: String,

    /// TCP host to bind to (only used with --transport tcp).
    #[arg(long, env = "GLOCKE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Frontend port — publishers connect here (only used with --transport tcp).
    #[arg(long, env = "GLOCKE_FRONTEND_PORT", default_value_t = 5555)]
    frontend_port: u16,

    /// Backend port — subscribers connect here (only used with --transport tcp).
    #[arg(long, env = "GLOCKE_BACKEND_PORT", default_value_t = 5556)]
    backend_port: u16,

    /// Health check port (only used with --transport tcp).
    #[arg(long, env = "GLOCKE_HEALTH_PORT", default_value_t = 5557)]
    health_port: u16,

    /// IPC socket name prefix (only used with --transport ipc).
    #[arg(long, env = "GLOCKE_IPC_PREFIX", default_value = "broker")]
    ipc_prefix: String,

    /// Interval in seconds between metrics log lines (0 = disabled).
    #[arg(long, env = "GLOCKE_METRICS_INTERVAL", default_value_t = 30)]
    metrics_interval: u64,
}

impl Cli {
    fn into_broker_config(self) -> BrokerConfig {
        match self.transport.as_str() {
            "tcp" => BrokerConfig::tcp(
                &self.host,
                self.frontend_port,
                self.backend_port,
                self.health_port,
            ),
            _ => BrokerConfig {
                frontend: Endpoint::ipc(&format!("{}-frontend", self.ipc_prefix)),
                backend: Endpoint::ipc(&format!("{}-backend", self.ipc_prefix)),
                health: Endpoint::ipc(&format!("{}-health", self.ipc_prefix)),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let metrics_interval = cli.metrics_interval;
    let broker = EventBroker::new(cli.into_broker_config());

    // Periodic traffic log line.
    if metrics_interval > 0 {
        let metrics = broker.metrics().clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                let counts = metrics.topic_counts.lock().await;
                tracing::info!(
                    total = metrics.total(),
                    topics = counts.len(),
                    "broker traffic"
                );
            }
        });
    }

    // Ctrl-C flips the shutdown flag; the proxy loop notices within 100ms.
    let shutdown = broker.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down broker");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    broker.run().await?;
    Ok(())
}
