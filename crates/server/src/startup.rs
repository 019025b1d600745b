//! Server startup: shared state initialization in dependency order.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use wecker_core::Config;
use wecker_glocke::{Endpoint, EventPublisher, ZmqPublisher};
use wecker_scheduler::new_shared_index;

use crate::state::AppState;

/// Build `AppState`: scheduler index and bus publisher on top of the
/// already-connected store pool.
pub async fn build_app_state(config: Config, pool: PgPool) -> anyhow::Result<Arc<AppState>> {
    let index = new_shared_index();

    let endpoint = Endpoint::parse(&config.bus.pub_endpoint)?;
    let publisher: Arc<dyn EventPublisher> = Arc::new(ZmqPublisher::connect(&endpoint).await?);
    info!(endpoint = %endpoint, "event bus publisher connected");

    Ok(Arc::new(AppState {
        config,
        pool,
        index,
        publisher,
        last_tick_epoch_ms: Arc::new(AtomicU64::new(0)),
        shutdown: Arc::new(AtomicBool::new(false)),
    }))
}
