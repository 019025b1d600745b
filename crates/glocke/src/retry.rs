//! Bounded-retry publishing with exponential back-off.
//!
//! The bus is allowed to push back; publishers absorb transient
//! saturation with a capped exponential back-off and surface
//! exhaustion as a terminal [`GlockeError::PublishFailed`] so the
//! caller can park the alarm in `failed` status.

use std::time::Duration;

use tracing::warn;

use crate::envelope::Envelope;
use crate::error::GlockeError;
use crate::traits::EventPublisher;

/// Back-off schedule for [`publish_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt; doubles each retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
    /// Total attempts including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// Publish `envelope`, retrying transient failures per `policy`.
///
/// Non-retryable failures (an event that cannot be encoded) bail
/// immediately; exhausting the attempt budget returns
/// [`GlockeError::PublishFailed`].
pub async fn publish_with_retry(
    publisher: &dyn EventPublisher,
    envelope: Envelope,
    policy: &RetryPolicy,
) -> Result<(), GlockeError> {
    let topic = envelope.topic();
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        match publisher.publish(envelope.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                last_error = e.to_string();
                if attempt < policy.max_attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        topic,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %last_error,
                        "publish failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(GlockeError::PublishFailed {
        topic: topic.to_string(),
        attempts: policy.max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::events::{AlarmTriggered, Event};

    use super::*;

    fn trigger_envelope() -> Envelope {
        Envelope::new(Event::AlarmTriggered(AlarmTriggered {
            code_id: "A1".into(),
            email: "user@example.com".into(),
            fired_at_utc: Utc.with_ymd_and_hms(2025, 1, 15, 17, 0, 0).unwrap(),
            occurrence_local_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            timezone: "America/Los_Angeles".into(),
            local_time: "09:00:00".parse().unwrap(),
        }))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        // Far past the cap.
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    /// Publisher that fails with a retryable error `failures` times,
    /// then succeeds.
    struct FlakyPublisher {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl EventPublisher for FlakyPublisher {
        async fn publish(&self, _envelope: Envelope) -> Result<(), GlockeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(GlockeError::Transport("saturated".into()))
            } else {
                Ok(())
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_millis(1),
            cap: Duration::from_millis(2),
            max_attempts: 5,
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let publisher = FlakyPublisher {
            failures: 3,
            calls: calls.clone(),
        };

        publish_with_retry(&publisher, trigger_envelope(), &fast_policy())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhaustion_is_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let publisher = FlakyPublisher {
            failures: u32::MAX,
            calls: calls.clone(),
        };

        let err = publish_with_retry(&publisher, trigger_envelope(), &fast_policy())
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match &err {
            GlockeError::PublishFailed {
                topic, attempts, ..
            } => {
                assert_eq!(topic, "alarm.triggered");
                assert_eq!(*attempts, 5);
            }
            other => panic!("expected PublishFailed, got {other:?}"),
        }
        assert!(!err.is_retryable());
    }
}
