use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use wecker_core::config::PostgresConfig;

use crate::error::StoreError;

/// Create the PostgreSQL connection pool.
///
/// Connections are leased per operation; the acquire timeout bounds how
/// long any store call can stall on pool exhaustion.
pub async fn init_pool(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| StoreError::Invalid("DATABASE_URL not set".to_string()))?;

    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(url)
        .await?;

    info!(
        "PostgreSQL pool ready ({}-{} connections)",
        config.min_connections, config.max_connections
    );
    Ok(pool)
}

/// Apply pending migrations. Additive only — adding columns with
/// defaults, never destructive renames at runtime.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("database migrations applied");
    Ok(())
}
