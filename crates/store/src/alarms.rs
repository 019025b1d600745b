//! Alarm row operations.
//!
//! Plain `sqlx::query` with explicit binds throughout — every statement
//! is prepared and cached by the pool. Status transitions that race
//! across replicas go through compare-and-set updates; the row count
//! tells the caller whether it won.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use wecker_core::alarm::{Alarm, AlarmStatus};
use wecker_core::temporal::ClockTime;

use crate::error::StoreError;

const SELECT_ALARM: &str = "SELECT code_id, email, local_time, utc_time, timezone, is_recurring, \
     days_of_week, status, last_fired_on, created_at, updated_at FROM alarms";

fn row_to_alarm(row: &PgRow) -> Result<Alarm, StoreError> {
    let code_id: String = row.try_get("code_id")?;
    let corrupt = |field: &str, value: &str| {
        StoreError::Invalid(format!("alarm {code_id}: bad {field} {value:?}"))
    };

    let local_time: String = row.try_get("local_time")?;
    let utc_time: String = row.try_get("utc_time")?;
    let timezone: String = row.try_get("timezone")?;
    let days_of_week: String = row.try_get("days_of_week")?;
    let status: String = row.try_get("status")?;

    Ok(Alarm {
        email: row.try_get("email")?,
        local_time: local_time
            .parse()
            .map_err(|_| corrupt("local_time", &local_time))?,
        utc_time: utc_time
            .parse()
            .map_err(|_| corrupt("utc_time", &utc_time))?,
        timezone: timezone
            .parse()
            .map_err(|_| corrupt("timezone", &timezone))?,
        is_recurring: row.try_get("is_recurring")?,
        days_of_week: days_of_week
            .parse()
            .map_err(|_| corrupt("days_of_week", &days_of_week))?,
        status: status.parse().map_err(|_| corrupt("status", &status))?,
        last_fired_on: row.try_get("last_fired_on")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        code_id,
    })
}

/// Insert a new alarm. A duplicate `code_id` surfaces as
/// [`StoreError::Conflict`].
pub async fn create(pool: &PgPool, alarm: &Alarm) -> Result<(), StoreError> {
    let result = sqlx::query(
        "INSERT INTO alarms (code_id, email, local_time, utc_time, timezone, is_recurring, \
         days_of_week, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(&alarm.code_id)
    .bind(&alarm.email)
    .bind(alarm.local_time.to_string())
    .bind(alarm.utc_time.to_string())
    .bind(alarm.timezone.name())
    .bind(alarm.is_recurring)
    .bind(alarm.days_of_week.to_string())
    .bind(alarm.status.as_str())
    .bind(alarm.created_at)
    .bind(alarm.updated_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(StoreError::Conflict(alarm.code_id.clone()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace the mutable definition fields of an alarm.
pub async fn update(pool: &PgPool, alarm: &Alarm) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE alarms SET email = $2, local_time = $3, utc_time = $4, timezone = $5, \
         is_recurring = $6, days_of_week = $7, updated_at = now() \
         WHERE code_id = $1",
    )
    .bind(&alarm.code_id)
    .bind(&alarm.email)
    .bind(alarm.local_time.to_string())
    .bind(alarm.utc_time.to_string())
    .bind(alarm.timezone.name())
    .bind(alarm.is_recurring)
    .bind(alarm.days_of_week.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(alarm.code_id.clone()));
    }
    Ok(())
}

/// Cancel an alarm. Idempotent: a cancel that lands after an occurrence
/// was claimed still records `canceled`; re-canceling is a no-op.
pub async fn cancel(pool: &PgPool, code_id: &str) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE alarms SET status = 'canceled', updated_at = now() \
         WHERE code_id = $1 AND status <> 'canceled'",
    )
    .bind(code_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }
    // Distinguish "no such alarm" from "already canceled".
    get(pool, code_id).await.map(|_| ())
}

/// Fetch a single alarm by its key.
pub async fn get(pool: &PgPool, code_id: &str) -> Result<Alarm, StoreError> {
    let sql = format!("{SELECT_ALARM} WHERE code_id = $1");
    let row = sqlx::query(&sql)
        .bind(code_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(code_id.to_string()))?;

    row_to_alarm(&row)
}

/// List alarms, optionally filtered by email and/or status.
pub async fn list(
    pool: &PgPool,
    email: Option<&str>,
    status: Option<AlarmStatus>,
) -> Result<Vec<Alarm>, StoreError> {
    let sql = format!(
        "{SELECT_ALARM} \
         WHERE ($1::text IS NULL OR email = $1) \
           AND ($2::text IS NULL OR status = $2) \
         ORDER BY code_id"
    );
    let rows = sqlx::query(&sql)
        .bind(email)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_alarm).collect()
}

/// All alarms currently in `scheduled` status — the cold-start and
/// reconciliation working set.
pub async fn list_scheduled(pool: &PgPool) -> Result<Vec<Alarm>, StoreError> {
    list(pool, None, Some(AlarmStatus::Scheduled)).await
}

/// Compare-and-set on status. Fails with [`StoreError::Stale`] when the
/// row's current status does not match `expected`.
pub async fn mark_status(
    pool: &PgPool,
    code_id: &str,
    new_status: AlarmStatus,
    expected: AlarmStatus,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE alarms SET status = $2, updated_at = now() \
         WHERE code_id = $1 AND status = $3",
    )
    .bind(code_id)
    .bind(new_status.as_str())
    .bind(expected.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Stale(code_id.to_string()));
    }
    Ok(())
}

/// Claim one occurrence of an alarm — the CAS-gate that serializes
/// firing across replicas.
///
/// Exactly one replica's update matches: the row must still be
/// `scheduled` and must not have fired on `occurrence` (or later)
/// already. The winning update stamps `last_fired_on` and advances the
/// status — `triggered` for one-shot alarms, still `scheduled` for
/// recurring ones. Returns whether this caller won the occurrence.
pub async fn claim_occurrence(
    pool: &PgPool,
    code_id: &str,
    occurrence: NaiveDate,
    is_recurring: bool,
) -> Result<bool, StoreError> {
    let new_status = if is_recurring {
        AlarmStatus::Scheduled
    } else {
        AlarmStatus::Triggered
    };

    let result = sqlx::query(
        "UPDATE alarms SET status = $2, last_fired_on = $3, updated_at = now() \
         WHERE code_id = $1 AND status = 'scheduled' \
           AND (last_fired_on IS NULL OR last_fired_on < $3)",
    )
    .bind(code_id)
    .bind(new_status.as_str())
    .bind(occurrence)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Persist a freshly derived UTC wall-clock after a recurrence advance
/// or a DST-induced re-key.
pub async fn update_utc_time(
    pool: &PgPool,
    code_id: &str,
    utc_time: ClockTime,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE alarms SET utc_time = $2, updated_at = now() WHERE code_id = $1",
    )
    .bind(code_id)
    .bind(utc_time.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(code_id.to_string()));
    }
    Ok(())
}

/// Delete terminal one-shot rows last touched before `cutoff`.
/// Returns the number of rows removed.
pub async fn delete_expired(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "DELETE FROM alarms \
         WHERE is_recurring = FALSE \
           AND status IN ('triggered', 'failed', 'canceled') \
           AND updated_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
