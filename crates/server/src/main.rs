mod api;
mod background;
mod cli;
mod controller;
mod router;
mod startup;
mod state;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{error, info};

use crate::controller::Controller;

/// Initialize shared state, run cold start, spawn background tasks,
/// and serve HTTP until interrupted.
async fn serve(config: wecker_core::Config) -> anyhow::Result<()> {
    if let Err(e) = config.validate() {
        error!("fatal config error: {e}");
        std::process::exit(1);
    }
    config.log_summary();

    // Startup order: store pool → scheduler index → controller → tick.
    let pool = match wecker_store::init_pool(&config.postgres).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("store unreachable: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = wecker_store::run_migrations(&pool).await {
        error!("migrations failed: {e}");
        std::process::exit(2);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = startup::build_app_state(config, pool).await?;
    let controller = Arc::new(Controller::new(state.clone()));

    // Cold start: rebuild the index from every scheduled row, deriving
    // fresh DST-correct UTC keys.
    let report = controller::reconcile(&state).await?;
    info!(
        loaded = report.added,
        scheduled = report.scheduled_in_store,
        "cold start complete"
    );

    background::spawn_background_tasks(state.clone(), controller);

    let app = router::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{addr}");

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received, shutting down");
            shutdown.store(true, Ordering::Relaxed);
        })
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    wecker_core::config::load_dotenv();
    let config = wecker_core::Config::from_env();
    let args: Vec<String> = std::env::args().collect();

    // Dispatch non-serve subcommands; returns false for `serve`.
    if !cli::dispatch(&config, &args).await? {
        serve(config).await?;
    }

    Ok(())
}
