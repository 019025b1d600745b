use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// Fatal configuration problems detected before startup proceeds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,

    #[error("SCHEDULER_TIMEZONE_DEFAULT is not a known IANA zone: {0}")]
    BadDefaultTimezone(String),
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub bus: BusConfig,
    pub scheduler: SchedulerConfig,
    pub smtp: SmtpConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            postgres: PostgresConfig::from_env(),
            bus: BusConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
            smtp: SmtpConfig::from_env(),
        }
    }

    /// Check for fatal misconfiguration. Called by binaries that need
    /// the store; failures map to exit code 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.postgres.database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if self
            .scheduler
            .default_timezone
            .parse::<chrono_tz::Tz>()
            .is_err()
        {
            return Err(ConfigError::BadDefaultTimezone(
                self.scheduler.default_timezone.clone(),
            ));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:    {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  postgres:  configured={}, pool={}..{}",
            self.postgres.database_url.is_some(),
            self.postgres.min_connections,
            self.postgres.max_connections
        );
        tracing::info!(
            "  bus:       pub={}, sub={}",
            self.bus.pub_endpoint,
            self.bus.sub_endpoint
        );
        tracing::info!(
            "  scheduler: default_tz={}, workers={}, cleanup={}s, reconcile={}s, retention={}h",
            self.scheduler.default_timezone,
            self.scheduler.worker_threads,
            self.scheduler.cleanup_interval_secs,
            self.scheduler.reconcile_interval_secs,
            self.scheduler.retention_hours
        );
        tracing::info!(
            "  smtp:      host={}, simulation={}",
            self.smtp.host.as_deref().unwrap_or("(none)"),
            self.smtp.simulation
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_u16("PORT", 3001),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Full connection URL from DATABASE_URL. Required for serve/migrate.
    pub database_url: Option<String>,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl PostgresConfig {
    fn from_env() -> Self {
        Self {
            database_url: env_opt("DATABASE_URL"),
            min_connections: env_u32("MIN_DB_CONNECTIONS", 5),
            max_connections: env_u32("MAX_DB_CONNECTIONS", 20),
            acquire_timeout_secs: env_u64("DB_ACQUIRE_TIMEOUT_SECS", 2),
        }
    }
}

// ── Event bus ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Broker frontend — publishers connect here.
    pub pub_endpoint: String,
    /// Broker backend — subscribers connect here.
    pub sub_endpoint: String,
}

impl BusConfig {
    fn from_env() -> Self {
        Self {
            pub_endpoint: env_or("BUS_URL", "tcp://127.0.0.1:5555"),
            sub_endpoint: env_or("BUS_SUB_URL", "tcp://127.0.0.1:5556"),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ingress fallback when a request omits `timezone`. A
    /// deployment-site assumption — clients should send it explicitly.
    pub default_timezone: String,
    /// Due-dispatch worker pool size.
    pub worker_threads: usize,
    pub cleanup_interval_secs: u64,
    pub reconcile_interval_secs: u64,
    /// Hours a terminal one-shot row is kept before deletion.
    pub retention_hours: u64,
}

impl SchedulerConfig {
    fn from_env() -> Self {
        Self {
            default_timezone: env_or("SCHEDULER_TIMEZONE_DEFAULT", "America/Los_Angeles"),
            worker_threads: env_usize("WORKER_THREADS", 8),
            cleanup_interval_secs: env_u64("CLEANUP_INTERVAL_SEC", 600),
            reconcile_interval_secs: env_u64("RECONCILE_INTERVAL_SEC", 600),
            retention_hours: env_u64("RETENTION_HOURS", 24),
        }
    }
}

// ── SMTP (email worker) ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub from: String,
    /// When true the email worker logs deliveries instead of sending.
    pub simulation: bool,
}

impl SmtpConfig {
    fn from_env() -> Self {
        Self {
            host: env_opt("SMTP_HOST"),
            port: env_u16("SMTP_PORT", 587),
            from: env_or("SMTP_FROM", "alarms@localhost"),
            simulation: env_bool("SIMULATION_MODE", true),
        }
    }
}
