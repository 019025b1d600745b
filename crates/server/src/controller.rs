//! Lifecycle controller: binds store, scheduler index, and bus.
//!
//! Implements the due-handler seam of the tick loop. Each due alarm id
//! is processed on a bounded worker pool: weekday gate, occurrence
//! claim (the cross-replica CAS), event publish with bounded retry,
//! then recurrence advance or terminal cleanup. The controller holds no
//! state of its own beyond the worker pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use wecker_core::alarm::AlarmStatus;
use wecker_core::temporal::{self, ClockTime};
use wecker_glocke::events::{AlarmTriggered, Event};
use wecker_glocke::retry::{publish_with_retry, RetryPolicy};
use wecker_glocke::Envelope;
use wecker_scheduler::{AlarmProjection, DueHandler};
use wecker_store::alarms;

use crate::state::AppState;

/// Per-due-id processing deadline. On timeout the worker logs and
/// abandons; the alarm keeps its status and is retried at its next
/// occurrence.
const WORKER_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Controller {
    state: Arc<AppState>,
    workers: Arc<tokio::sync::Semaphore>,
    retry: RetryPolicy,
}

impl Controller {
    pub fn new(state: Arc<AppState>) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        // Configured size, capped at the available cores.
        let workers = state.config.scheduler.worker_threads.clamp(1, cores);
        Self {
            state,
            workers: Arc::new(tokio::sync::Semaphore::new(workers)),
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl DueHandler for Controller {
    /// Fan the due-set out across the worker pool and return. The tick
    /// loop never waits for store or bus I/O.
    async fn on_due(&self, fired_at: DateTime<Utc>, due: Vec<AlarmProjection>) {
        for projection in due {
            let state = self.state.clone();
            let workers = self.workers.clone();
            let retry = self.retry.clone();

            tokio::spawn(async move {
                let _permit = match workers.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return, // semaphore closed during shutdown
                };
                let code_id = projection.code_id.clone();
                match tokio::time::timeout(
                    WORKER_TIMEOUT,
                    process_due(&state, projection, fired_at, &retry),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(code_id, error = %e, "due-id processing failed"),
                    Err(_) => warn!(code_id, "due-id worker timed out, abandoning"),
                }
            });
        }
    }
}

/// Whether the occurrence qualifies: the weekday check runs in the
/// alarm's own timezone, never the server's.
fn qualifies_today(projection: &AlarmProjection, fired_at: DateTime<Utc>) -> bool {
    let weekday = temporal::weekday_in_zone(fired_at, projection.timezone);
    projection.days_of_week.contains(weekday)
}

/// The index key for a recurring alarm's next occurrence after
/// `occurrence`: the qualifying date and the UTC wall-clock derived at
/// that date (it may shift across a DST transition).
fn next_occurrence_key(
    projection: &AlarmProjection,
    occurrence: NaiveDate,
) -> Option<(NaiveDate, ClockTime)> {
    let next_date = temporal::next_weekday_date(occurrence, projection.days_of_week)?;
    let utc = temporal::local_to_utc(projection.local_time, projection.timezone, next_date).ok()?;
    Some((next_date, utc))
}

/// Steps 1-6 of tick handling for one due alarm id.
async fn process_due(
    state: &Arc<AppState>,
    projection: AlarmProjection,
    fired_at: DateTime<Utc>,
    retry: &RetryPolicy,
) -> anyhow::Result<()> {
    let code_id = projection.code_id.clone();

    // 1-2. Weekday gate. A non-qualifying day leaves the alarm indexed.
    if !qualifies_today(&projection, fired_at) {
        debug!(code_id, "not a qualifying weekday, skipping");
        return Ok(());
    }

    let occurrence = fired_at
        .with_timezone(&projection.timezone)
        .date_naive();

    // 3. Claim the occurrence. Exactly one replica in the cluster wins
    // this compare-and-set; everyone else drops out here.
    let claimed =
        alarms::claim_occurrence(&state.pool, &code_id, occurrence, projection.is_recurring)
            .await?;
    if !claimed {
        debug!(code_id, %occurrence, "occurrence already claimed or alarm no longer scheduled");
        if !projection.is_recurring {
            // The row is terminal (fired elsewhere or canceled); stop
            // indexing it locally rather than waiting for reconciliation.
            let mut index = state.index.write().expect("index lock poisoned");
            index.remove(&code_id);
        }
        return Ok(());
    }

    // 4. Publish the trigger event.
    let envelope = Envelope::new(Event::AlarmTriggered(AlarmTriggered {
        code_id: code_id.clone(),
        email: projection.email.clone(),
        fired_at_utc: fired_at,
        occurrence_local_date: occurrence,
        timezone: projection.timezone.name().to_string(),
        local_time: projection.local_time,
    }));

    if let Err(e) = publish_with_retry(state.publisher.as_ref(), envelope, retry).await {
        // 5. Retries exhausted: park the alarm until an operator steps in.
        error!(code_id, error = %e, "publish exhausted retries — marking alarm failed");
        let expected = if projection.is_recurring {
            AlarmStatus::Scheduled
        } else {
            AlarmStatus::Triggered
        };
        if let Err(e) = alarms::mark_status(&state.pool, &code_id, AlarmStatus::Failed, expected).await
        {
            warn!(code_id, error = %e, "failed-status transition lost");
        }
        let mut index = state.index.write().expect("index lock poisoned");
        index.remove(&code_id);
        return Ok(());
    }

    info!(
        code_id,
        email = %projection.email,
        %occurrence,
        local_time = %projection.local_time,
        "alarm fired"
    );

    // 6. Recurrence advance, or terminal cleanup for one-shots.
    if projection.is_recurring {
        match next_occurrence_key(&projection, occurrence) {
            Some((next_date, next_utc)) => {
                alarms::update_utc_time(&state.pool, &code_id, next_utc).await?;
                let mut index = state.index.write().expect("index lock poisoned");
                index.add(projection.clone(), next_utc);
                debug!(code_id, %next_date, %next_utc, "recurring alarm re-armed");
            }
            None => {
                // Unreachable for validated alarms; repair rather than fire daily.
                warn!(code_id, "recurring alarm has no qualifying weekday — removing from index");
                let mut index = state.index.write().expect("index lock poisoned");
                index.remove(&code_id);
            }
        }
    } else {
        let mut index = state.index.write().expect("index lock poisoned");
        index.remove(&code_id);
    }

    Ok(())
}

// ── Reconciliation ────────────────────────────────────────────────

/// Outcome of one reconciliation pass, surfaced by `/reload` and the
/// periodic scan.
#[derive(Debug, Default, serde::Serialize)]
pub struct ReconcileReport {
    pub scheduled_in_store: usize,
    pub added: usize,
    pub rekeyed: usize,
    pub removed: usize,
}

/// Compare index membership against the store's scheduled set and
/// repair drift. Also the cold-start loader: on an empty index it
/// simply loads everything, deriving each alarm's UTC second at its
/// next firing date (DST-correct).
pub async fn reconcile(state: &Arc<AppState>) -> anyhow::Result<ReconcileReport> {
    let scheduled = alarms::list_scheduled(&state.pool).await?;
    let now = Utc::now();
    let mut report = ReconcileReport {
        scheduled_in_store: scheduled.len(),
        ..Default::default()
    };

    // Desired index contents, keyed at each alarm's next firing date.
    let mut desired: HashMap<String, (AlarmProjection, ClockTime)> = HashMap::new();
    for alarm in &scheduled {
        let Some(fire_date) =
            temporal::next_fire_date(alarm.timezone, alarm.days_of_week, now, alarm.last_fired_on)
        else {
            warn!(code_id = %alarm.code_id, "scheduled alarm has no qualifying weekday");
            continue;
        };
        let utc = match temporal::local_to_utc(alarm.local_time, alarm.timezone, fire_date) {
            Ok(utc) => utc,
            Err(e) => {
                warn!(code_id = %alarm.code_id, error = %e, "utc derivation failed");
                continue;
            }
        };
        if utc != alarm.utc_time {
            // DST moved the wall clock; keep the stored projection honest.
            if let Err(e) = alarms::update_utc_time(&state.pool, &alarm.code_id, utc).await {
                warn!(code_id = %alarm.code_id, error = %e, "utc_time persist failed");
            }
        }
        desired.insert(alarm.code_id.clone(), (AlarmProjection::from(alarm), utc));
    }

    {
        let mut index = state.index.write().expect("index lock poisoned");

        for stale_id in index
            .code_ids()
            .into_iter()
            .filter(|id| !desired.contains_key(id))
        {
            index.remove(&stale_id);
            report.removed += 1;
        }

        for (code_id, (projection, utc)) in desired {
            match index.slot_of(&code_id) {
                None => {
                    index.add(projection, utc);
                    report.added += 1;
                }
                Some(slot) if slot != utc.second_of_day() => {
                    index.add(projection, utc);
                    report.rekeyed += 1;
                }
                Some(_) => {}
            }
        }
    }

    if report.added + report.rekeyed + report.removed > 0 {
        info!(
            scheduled = report.scheduled_in_store,
            added = report.added,
            rekeyed = report.rekeyed,
            removed = report.removed,
            "index reconciled"
        );
    }
    Ok(report)
}
