//! Background task spawning: tick loop, cleanup, reconciliation.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use wecker_scheduler::{run_tick_loop, TickConfig};
use wecker_store::alarms;

use crate::controller::{self, Controller};
use crate::state::AppState;

/// Spawn every background task. Call after cold start so the tick loop
/// starts against a populated index.
pub fn spawn_background_tasks(state: Arc<AppState>, controller: Arc<Controller>) {
    // Tick loop — the scheduler's heartbeat.
    tokio::spawn(run_tick_loop(
        state.index.clone(),
        controller,
        state.last_tick_epoch_ms.clone(),
        state.shutdown.clone(),
        TickConfig::default(),
    ));

    tokio::spawn(cleanup_loop(state.clone()));
    tokio::spawn(reconcile_loop(state));
}

/// Periodically delete terminal one-shot rows past retention.
async fn cleanup_loop(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.scheduler.cleanup_interval_secs.max(1));
    let retention = chrono::Duration::hours(state.config.scheduler.retention_hours as i64);
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // the first tick fires immediately; skip it

    loop {
        interval.tick().await;
        if state.shutdown.load(Ordering::Relaxed) {
            return;
        }
        match alarms::delete_expired(&state.pool, Utc::now() - retention).await {
            Ok(0) => {}
            Ok(count) => info!(count, "expired alarms deleted"),
            Err(e) => warn!(error = %e, "cleanup pass failed"),
        }
    }
}

/// Periodically repair index/store drift and DST-shifted keys.
async fn reconcile_loop(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.scheduler.reconcile_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        interval.tick().await;
        if state.shutdown.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = controller::reconcile(&state).await {
            warn!(error = %e, "reconciliation pass failed");
        }
    }
}
