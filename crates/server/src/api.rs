use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use wecker_core::alarm::{validate_email, Alarm, AlarmStatus, DaySet};
use wecker_core::temporal::{self, ClockTime};
use wecker_core::ValidationError;
use wecker_scheduler::{AlarmProjection, IndexStats};
use wecker_store::{alarms, descriptions, StoreError};

use crate::controller::{self, ReconcileReport};
use crate::state::AppState;

/// Tick staleness above which /health reports the replica unhealthy.
const MAX_TICK_AGE_MS: u64 = 5_000;

// ── Error mapping ─────────────────────────────────────────────────

pub enum ApiError {
    Validation(ValidationError),
    BadQuery(String),
    Store(StoreError),
    Internal(anyhow::Error),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match self {
            Self::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::BadQuery(reason) => (StatusCode::BAD_REQUEST, reason),
            Self::Store(StoreError::Conflict(id)) => {
                (StatusCode::CONFLICT, format!("alarm already exists: {id}"))
            }
            Self::Store(StoreError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("alarm not found: {id}"))
            }
            Self::Store(StoreError::Stale(id)) => {
                (StatusCode::CONFLICT, format!("stale status update for {id}"))
            }
            Self::Store(e) if e.is_retryable() => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            Self::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(serde_json::json!({ "error": reason }))).into_response()
    }
}

// ── Request / response bodies ─────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateAlarmRequest {
    pub code_id: String,
    pub email: String,
    /// Local wall-clock time, `HH:MM` or `HH:MM:SS`.
    pub time: String,
    /// IANA zone name. Falls back to the configured deployment default
    /// when omitted; new clients should always send it.
    pub timezone: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    /// Comma-joined short names (`"Mon,Wed,Fri"`). Empty or omitted on
    /// a one-shot alarm means every day.
    pub days_of_week: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AlarmResponse {
    pub code_id: String,
    pub email: String,
    /// The user's local wall-clock time.
    pub time: ClockTime,
    /// UTC counterpart of `time` for today's date.
    pub utc_time: ClockTime,
    pub timezone: String,
    pub is_recurring: bool,
    pub days_of_week: DaySet,
    pub status: AlarmStatus,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl AlarmResponse {
    /// Render an alarm, re-deriving `utc_time` for today so the caller
    /// always sees the DST-current value.
    fn from_alarm(alarm: &Alarm) -> Self {
        let today = Utc::now().with_timezone(&alarm.timezone).date_naive();
        let utc_time = temporal::local_to_utc(alarm.local_time, alarm.timezone, today)
            .unwrap_or(alarm.utc_time);
        Self {
            code_id: alarm.code_id.clone(),
            email: alarm.email.clone(),
            time: alarm.local_time,
            utc_time,
            timezone: alarm.timezone.name().to_string(),
            is_recurring: alarm.is_recurring,
            days_of_week: alarm.days_of_week,
            status: alarm.status,
            created_at: alarm.created_at,
            updated_at: alarm.updated_at,
        }
    }
}

/// Validate an ingress request into a storable alarm, deriving the UTC
/// wall-clock at the alarm's next firing date.
pub fn validate_create(
    request: &CreateAlarmRequest,
    default_timezone: &str,
    now: chrono::DateTime<Utc>,
) -> Result<Alarm, ValidationError> {
    if request.code_id.trim().is_empty() {
        return Err(ValidationError::EmptyCodeId);
    }
    validate_email(&request.email)?;

    let local_time: ClockTime = request.time.parse().map_err(ValidationError::Temporal)?;
    let timezone = temporal::parse_zone(
        request.timezone.as_deref().unwrap_or(default_timezone),
    )?;

    let days_of_week = match request.days_of_week.as_deref() {
        Some(raw) => raw.parse::<DaySet>()?,
        None => DaySet::empty(),
    };
    let days_of_week = if days_of_week.is_empty() {
        if request.is_recurring {
            return Err(ValidationError::EmptyDays);
        }
        // One-shot: empty means "the next matching second, any day".
        DaySet::all()
    } else {
        days_of_week
    };

    let fire_date = temporal::next_fire_date(timezone, days_of_week, now, None)
        .expect("non-empty day set always has a next date");
    let utc_time = temporal::local_to_utc(local_time, timezone, fire_date)?;

    Ok(Alarm {
        code_id: request.code_id.trim().to_string(),
        email: request.email.clone(),
        local_time,
        utc_time,
        timezone,
        is_recurring: request.is_recurring,
        days_of_week,
        status: AlarmStatus::Scheduled,
        last_fired_on: None,
        created_at: now,
        updated_at: now,
    })
}

// ── Alarm CRUD ────────────────────────────────────────────────────

pub async fn create_alarm(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAlarmRequest>,
) -> Result<(StatusCode, Json<AlarmResponse>), ApiError> {
    let alarm = validate_create(
        &request,
        &state.config.scheduler.default_timezone,
        Utc::now(),
    )?;

    alarms::create(&state.pool, &alarm).await?;

    {
        let mut index = state.index.write().expect("index lock poisoned");
        index.add(AlarmProjection::from(&alarm), alarm.utc_time);
    }

    info!(
        code_id = %alarm.code_id,
        utc_time = %alarm.utc_time,
        timezone = %alarm.timezone.name(),
        "alarm scheduled"
    );
    Ok((StatusCode::CREATED, Json(AlarmResponse::from_alarm(&alarm))))
}

pub async fn get_alarm(
    State(state): State<Arc<AppState>>,
    Path(code_id): Path<String>,
) -> Result<Json<AlarmResponse>, ApiError> {
    let alarm = alarms::get(&state.pool, &code_id).await?;
    Ok(Json(AlarmResponse::from_alarm(&alarm)))
}

pub async fn delete_alarm(
    State(state): State<Arc<AppState>>,
    Path(code_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    alarms::cancel(&state.pool, &code_id).await?;
    {
        let mut index = state.index.write().expect("index lock poisoned");
        index.remove(&code_id);
    }
    info!(code_id, "alarm canceled");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub email: Option<String>,
    pub status: Option<String>,
}

pub async fn list_alarms(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AlarmResponse>>, ApiError> {
    // Empty filter values are treated as absent.
    let email = params.email.as_deref().filter(|s| !s.is_empty());
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<AlarmStatus>().map_err(ApiError::BadQuery)?),
        None => None,
    };

    let rows = alarms::list(&state.pool, email, status).await?;
    Ok(Json(rows.iter().map(AlarmResponse::from_alarm).collect()))
}

// ── Operational endpoints ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub alarm_count: usize,
    pub tick_age_ms: u64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let alarm_count = {
        let index = state.index.read().expect("index lock poisoned");
        index.len()
    };
    let last_tick = state.last_tick_epoch_ms.load(Ordering::Relaxed);
    let tick_age_ms = (Utc::now().timestamp_millis() as u64).saturating_sub(last_tick);

    // A replica whose tick loop has stalled must fail its probe.
    if last_tick == 0 || tick_age_ms > MAX_TICK_AGE_MS {
        let body = HealthResponse {
            status: "unhealthy",
            alarm_count,
            tick_age_ms,
        };
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    Json(HealthResponse {
        status: "ok",
        alarm_count,
        tick_age_ms,
    })
    .into_response()
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<IndexStats> {
    let index = state.index.read().expect("index lock poisoned");
    Json(index.stats())
}

/// Force a reconciliation pass (also re-derives DST-shifted UTC keys).
pub async fn reload(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let report = controller::reconcile(&state).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct DescriptionBody {
    pub description: String,
}

pub async fn put_code_description(
    State(state): State<Arc<AppState>>,
    Path(code_id): Path<String>,
    Json(body): Json<DescriptionBody>,
) -> Result<StatusCode, ApiError> {
    descriptions::set_description(&state.pool, &code_id, &body.description).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn request(time: &str, zone: Option<&str>, recurring: bool, days: Option<&str>) -> CreateAlarmRequest {
        CreateAlarmRequest {
            code_id: "A1".into(),
            email: "user@example.com".into(),
            time: time.into(),
            timezone: zone.map(String::from),
            is_recurring: recurring,
            days_of_week: days.map(String::from),
        }
    }

    fn mid_january() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn create_derives_utc_from_zone() {
        let alarm = validate_create(
            &request("09:00:00", Some("America/Los_Angeles"), false, None),
            "UTC",
            mid_january(),
        )
        .unwrap();
        assert_eq!(alarm.utc_time, "17:00:00".parse().unwrap());
        assert_eq!(alarm.status, AlarmStatus::Scheduled);
        assert_eq!(alarm.days_of_week, DaySet::all());
    }

    #[test]
    fn create_falls_back_to_default_zone() {
        let alarm = validate_create(
            &request("09:00", None, false, None),
            "America/Los_Angeles",
            mid_january(),
        )
        .unwrap();
        assert_eq!(alarm.timezone.name(), "America/Los_Angeles");
        assert_eq!(alarm.local_time, "09:00:00".parse().unwrap());
    }

    #[test]
    fn create_derives_utc_at_next_qualifying_date_across_dst() {
        // Requested on Fri 2025-03-07 for Mon/Wed only: the next
        // occurrence is Mon 03-10, after the LA spring-forward, so the
        // UTC key is 16:00 — not today's 17:00.
        let now = Utc.with_ymd_and_hms(2025, 3, 7, 20, 0, 0).unwrap();
        let alarm = validate_create(
            &request("09:00:00", Some("America/Los_Angeles"), true, Some("Mon,Wed")),
            "UTC",
            now,
        )
        .unwrap();
        assert_eq!(alarm.utc_time, "16:00:00".parse().unwrap());
    }

    #[test]
    fn create_rejects_bad_fields() {
        let now = mid_january();
        let blank_code = CreateAlarmRequest {
            code_id: "  ".into(),
            ..request("09:00", None, false, None)
        };
        assert!(matches!(
            validate_create(&blank_code, "UTC", now),
            Err(ValidationError::EmptyCodeId)
        ));
        assert!(validate_create(&request("25:00", None, false, None), "UTC", now).is_err());
        assert!(
            validate_create(&request("09:00", Some("Mars/Base"), false, None), "UTC", now)
                .is_err()
        );
        assert!(matches!(
            validate_create(&request("09:00", None, true, Some("")), "UTC", now),
            Err(ValidationError::EmptyDays)
        ));
        assert!(
            validate_create(&request("09:00", None, false, Some("Mon,Funday")), "UTC", now)
                .is_err()
        );
    }
}
