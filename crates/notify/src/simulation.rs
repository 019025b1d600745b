//! Log-only delivery for test and development environments.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::traits::{Notification, Notifier, NotifyError};

/// Logs deliveries instead of sending them. Active when
/// `SIMULATION_MODE` is on or no SMTP host is configured.
#[derive(Debug, Default)]
pub struct SimulationNotifier {
    sent: AtomicU64,
}

impl SimulationNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Notifier for SimulationNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            to = %notification.to,
            subject = %notification.subject,
            "simulated email delivery"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_deliveries() {
        let notifier = SimulationNotifier::new();
        let n = Notification {
            to: "user@example.com".into(),
            subject: "Alarm: A1".into(),
            body: "ring".into(),
        };
        notifier.send(&n).await.unwrap();
        notifier.send(&n).await.unwrap();
        assert_eq!(notifier.sent_count(), 2);
    }
}
