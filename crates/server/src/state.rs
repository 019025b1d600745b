use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use sqlx::PgPool;

use wecker_core::Config;
use wecker_glocke::EventPublisher;
use wecker_scheduler::SharedIndex;

/// Process-wide shared state.
///
/// Startup order matters: store pool, then scheduler index, then the
/// controller, then the tick loop — and teardown in reverse (the
/// shutdown flag stops the loops before the pool drops).
pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub index: SharedIndex,
    pub publisher: Arc<dyn EventPublisher>,
    /// Epoch millis of the most recent tick; backs `tick_age_ms` in /health.
    pub last_tick_epoch_ms: Arc<AtomicU64>,
    /// Flips once on shutdown; every background loop polls it.
    pub shutdown: Arc<AtomicBool>,
}
