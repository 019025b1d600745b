//! The once-per-second tick loop.
//!
//! Reads the UTC clock each second, pulls the due-set for that second
//! out of the index, and hands it to the registered [`DueHandler`].
//! A late tick is never silently skipped: every missed second is
//! processed in order. A duplicated second (clock stutter) is processed
//! exactly once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::index::{AlarmProjection, SharedIndex, SECONDS_PER_DAY};

/// Receives each second's due-set.
///
/// Implementations must dispatch and return promptly — the tick loop
/// itself never blocks on I/O, so slow work belongs on a worker pool
/// behind this seam.
#[async_trait]
pub trait DueHandler: Send + Sync {
    /// `fired_at` is the UTC second being processed (it lags wall-clock
    /// time during catch-up); `due` is a detached snapshot.
    async fn on_due(&self, fired_at: DateTime<Utc>, due: Vec<AlarmProjection>);
}

#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ceiling on catch-up after a stall. One full day covers every
    /// bucket; anything older is the same second of day again.
    pub max_catchup_seconds: i64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            max_catchup_seconds: i64::from(SECONDS_PER_DAY),
        }
    }
}

/// The UTC seconds that need processing given the previous processed
/// second and the current clock reading.
///
/// - first call (`last == None`): just the current second
/// - stutter or backwards clock (`now <= last`): nothing
/// - late tick: every missed second in order, clamped to `max_catchup`
pub fn seconds_to_process(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_catchup: i64,
) -> Vec<DateTime<Utc>> {
    let now = now.with_nanosecond(0).expect("zero is a valid nanosecond");
    let Some(last) = last else {
        return vec![now];
    };

    let delta = (now - last).num_seconds();
    if delta <= 0 {
        return Vec::new();
    }

    let skipped = (delta - max_catchup).max(0);
    (skipped + 1..=delta)
        .map(|s| last + TimeDelta::seconds(s))
        .collect()
}

/// Run the tick loop until `shutdown` flips.
///
/// `last_tick_epoch_ms` is refreshed every iteration and backs the
/// health endpoint's `tick_age_ms`.
pub async fn run_tick_loop(
    index: SharedIndex,
    handler: Arc<dyn DueHandler>,
    last_tick_epoch_ms: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    config: TickConfig,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);

    let mut last: Option<DateTime<Utc>> = None;
    info!("tick loop started");

    loop {
        interval.tick().await;
        if shutdown.load(Ordering::Relaxed) {
            info!("tick loop stopped");
            return;
        }

        let now = Utc::now();
        last_tick_epoch_ms.store(now.timestamp_millis() as u64, Ordering::Relaxed);

        let pending = seconds_to_process(last, now, config.max_catchup_seconds);
        if pending.len() > 1 {
            warn!(missed = pending.len() - 1, "late tick, catching up");
        }

        for instant in pending {
            let second = instant.num_seconds_from_midnight();
            let due = {
                let index = index.read().expect("index lock poisoned");
                index.due(second)
            };
            if !due.is_empty() {
                debug!(second, count = due.len(), "due-set extracted");
                handler.on_due(instant, due).await;
            }
            last = Some(instant);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, h, m, s).unwrap()
    }

    #[test]
    fn first_tick_processes_current_second() {
        let now = at(12, 0, 0) + TimeDelta::milliseconds(250);
        assert_eq!(seconds_to_process(None, now, 86_400), vec![at(12, 0, 0)]);
    }

    #[test]
    fn stutter_is_skipped() {
        let last = at(12, 0, 0);
        let now = at(12, 0, 0) + TimeDelta::milliseconds(900);
        assert!(seconds_to_process(Some(last), now, 86_400).is_empty());
    }

    #[test]
    fn backwards_clock_is_skipped() {
        let last = at(12, 0, 5);
        assert!(seconds_to_process(Some(last), at(12, 0, 3), 86_400).is_empty());
    }

    #[test]
    fn missed_seconds_are_processed_in_order() {
        let last = at(12, 0, 0);
        let got = seconds_to_process(Some(last), at(12, 0, 4), 86_400);
        assert_eq!(got, vec![at(12, 0, 1), at(12, 0, 2), at(12, 0, 3), at(12, 0, 4)]);
    }

    #[test]
    fn catch_up_is_clamped() {
        let last = at(0, 0, 0);
        let got = seconds_to_process(Some(last), at(3, 0, 0), 10);
        assert_eq!(got.len(), 10);
        assert_eq!(*got.last().unwrap(), at(3, 0, 0));
        assert_eq!(got[0], at(2, 59, 51));
    }

    #[tokio::test]
    async fn tick_loop_delivers_due_sets() {
        use std::sync::Mutex;

        use crate::index::new_shared_index;
        use wecker_core::alarm::DaySet;

        struct Recorder {
            seen: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl DueHandler for Recorder {
            async fn on_due(&self, _fired_at: DateTime<Utc>, due: Vec<AlarmProjection>) {
                let mut seen = self.seen.lock().unwrap();
                seen.extend(due.into_iter().map(|p| p.code_id));
            }
        }

        let index = new_shared_index();
        // Arm an alarm for the second after next so the loop hits it.
        let fire_at = (Utc::now() + TimeDelta::seconds(1))
            .with_nanosecond(0)
            .unwrap();
        {
            let mut guard = index.write().unwrap();
            guard.add(
                AlarmProjection {
                    code_id: "A1".into(),
                    email: "user@example.com".into(),
                    timezone: chrono_tz::UTC,
                    local_time: "00:00:00".parse().unwrap(),
                    days_of_week: DaySet::all(),
                    is_recurring: false,
                },
                wecker_core::temporal::ClockTime::from_naive(fire_at.time()),
            );
        }

        let handler = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let last_tick = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let loop_handle = tokio::spawn(run_tick_loop(
            index,
            handler.clone(),
            last_tick.clone(),
            shutdown.clone(),
            TickConfig::default(),
        ));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.store(true, Ordering::Relaxed);
        let _ = loop_handle.await;

        assert_eq!(*handler.seen.lock().unwrap(), vec!["A1".to_string()]);
        assert!(last_tick.load(Ordering::Relaxed) > 0);
    }
}
