use thiserror::Error;

use crate::temporal::TemporalError;

/// Ingress validation failures. Every variant maps to a structured
/// `400` reason at the HTTP layer.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("code_id must not be empty")]
    EmptyCodeId,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("invalid days_of_week: {0}")]
    InvalidDays(String),

    #[error("a recurring alarm needs at least one weekday")]
    EmptyDays,

    #[error(transparent)]
    Temporal(#[from] TemporalError),
}
