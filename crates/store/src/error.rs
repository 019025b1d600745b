use thiserror::Error;

/// Errors surfaced by the alarm store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with this `code_id` already exists.
    #[error("alarm already exists: {0}")]
    Conflict(String),

    #[error("alarm not found: {0}")]
    NotFound(String),

    /// A compare-and-set lost: the row's status no longer matches the
    /// caller's expectation (another replica advanced it first).
    #[error("stale status update for {0}")]
    Stale(String),

    /// A persisted value could not be interpreted (corrupt row or
    /// schema drift).
    #[error("invalid stored value: {0}")]
    Invalid(String),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Transient I/O errors are retryable; constraint violations and
    /// CAS losses are terminal for the attempted operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_retryable() {
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_retryable());
    }

    #[test]
    fn conflicts_and_cas_losses_are_terminal() {
        assert!(!StoreError::Conflict("X".into()).is_retryable());
        assert!(!StoreError::Stale("X".into()).is_retryable());
        assert!(!StoreError::NotFound("X".into()).is_retryable());
    }
}
