//! email-worker — downstream consumer for triggered alarms.
//!
//! Subscribes to `alarm.triggered`, enriches each event with the code
//! description from the store (falling back to a generic line when
//! none is registered or no database is configured), publishes the
//! resulting `email.request` for other consumers, and delivers the
//! email itself.
//!
//! Delivery off the bus is at-least-once; duplicates are dropped via a
//! bounded seen-window keyed on `(code_id, occurrence_local_date)`.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use wecker_core::config;
use wecker_glocke::events::{AlarmTriggered, EmailRequest, Event};
use wecker_glocke::{
    topics, Endpoint, Envelope, EventPublisher, EventSubscriber, ZmqPublisher, ZmqSubscriber,
};
use wecker_notify::{
    notification_for, DedupWindow, EmailNotifier, Notifier, SimulationNotifier,
};

/// Glocke worker delivering alarm emails.
#[derive(Parser, Debug)]
#[command(name = "email-worker", version, about)]
struct Cli {
    /// Broker frontend endpoint (publish side).
    #[arg(long, env = "BUS_URL", default_value = "tcp://127.0.0.1:5555")]
    bus_url: String,

    /// Broker backend endpoint (subscribe side).
    #[arg(long, env = "BUS_SUB_URL", default_value = "tcp://127.0.0.1:5556")]
    bus_sub_url: String,

    /// Size of the duplicate-suppression window.
    #[arg(long, env = "DEDUP_WINDOW", default_value_t = 10_000)]
    dedup_window: usize,
}

/// Resolve the description for a code, with the original fallback line.
async fn describe(pool: Option<&sqlx::PgPool>, code_id: &str) -> String {
    if let Some(pool) = pool {
        match wecker_store::descriptions::get_description(pool, code_id).await {
            Ok(Some(description)) => return description,
            Ok(None) => {}
            Err(e) => warn!(code_id, error = %e, "description lookup failed"),
        }
    }
    format!("Alarm code {code_id} has been triggered")
}

async fn handle_trigger(
    event: AlarmTriggered,
    correlation_id: uuid::Uuid,
    pool: Option<&sqlx::PgPool>,
    publisher: &ZmqPublisher,
    notifier: &dyn Notifier,
) -> anyhow::Result<()> {
    let description = describe(pool, &event.code_id).await;

    let request = EmailRequest {
        to_email: event.email.clone(),
        code_id: event.code_id.clone(),
        description,
        alarm_time: event.local_time,
        timezone: event.timezone.clone(),
        occurrence_local_date: event.occurrence_local_date,
    };

    // Re-publish for audit and any other email.request consumers,
    // keeping the trigger's correlation id.
    let envelope = Envelope::with_correlation(Event::EmailRequest(request.clone()), correlation_id);
    if let Err(e) = publisher.publish(envelope).await {
        warn!(code_id = %request.code_id, error = %e, "email.request publish failed");
    }

    let notification = notification_for(&request);
    notifier.send(&notification).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config::load_dotenv();
    let cli = Cli::parse();
    let cfg = wecker_core::Config::from_env();

    let notifier: Arc<dyn Notifier> = match (&cfg.smtp.host, cfg.smtp.simulation) {
        (Some(host), false) => {
            info!(host = %host, port = cfg.smtp.port, "SMTP delivery active");
            Arc::new(EmailNotifier::from_config(host, cfg.smtp.port, &cfg.smtp.from)?)
        }
        _ => {
            info!("simulation mode — deliveries are logged, not sent");
            Arc::new(SimulationNotifier::new())
        }
    };

    // Description lookups are best-effort; the worker runs without a
    // database and falls back to the generic line.
    let pool = match &cfg.postgres.database_url {
        Some(_) => match wecker_store::init_pool(&cfg.postgres).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "store unavailable — using fallback descriptions");
                None
            }
        },
        None => None,
    };

    let subscriber = ZmqSubscriber::connect(&Endpoint::parse(&cli.bus_sub_url)?).await?;
    subscriber.subscribe(topics::ALARM_TRIGGERED).await?;
    let publisher = ZmqPublisher::connect(&Endpoint::parse(&cli.bus_url)?).await?;

    let mut seen = DedupWindow::new(cli.dedup_window);
    info!("email-worker started");

    loop {
        let envelope = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
            result = subscriber.recv() => match result {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(error = %e, "bus recv error");
                    continue;
                }
            },
        };

        let correlation_id = envelope.correlation_id;
        let Event::AlarmTriggered(event) = envelope.event else {
            continue;
        };

        if !seen.insert(&event.dedup_key()) {
            info!(code_id = %event.code_id, "duplicate occurrence skipped");
            continue;
        }

        if let Err(e) = handle_trigger(
            event,
            correlation_id,
            pool.as_ref(),
            &publisher,
            notifier.as_ref(),
        )
        .await
        {
            warn!(error = %e, "trigger handling failed");
        }
    }

    Ok(())
}
