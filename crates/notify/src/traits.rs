//! Notifier trait definition and shared error types.

use async_trait::async_trait;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Recipient address.
    pub to: String,
    /// The rendered subject line.
    pub subject: String,
    /// The rendered plain-text body.
    pub body: String,
}

/// Trait for notification channel implementations.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Human-readable channel name for logging.
    fn name(&self) -> &'static str;
}
