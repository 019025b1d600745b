//! Timezone-aware temporal model.
//!
//! All scheduling decisions happen on UTC wall-clock seconds; timezone
//! math lives here and is invoked only at ingress (alarm creation),
//! recurrence advance, and weekday-check time — never in the tick loop.
//!
//! DST policy: a local time that falls into a spring-forward gap is
//! shifted forward by the size of the gap (02:30 in a one-hour gap
//! resolves to 03:30); an ambiguous fall-back time resolves to the
//! earlier (pre-transition) instant.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::alarm::DaySet;

/// Errors surfaced by temporal conversions.
///
/// Gap and overlap cases never escape — they are resolved by the
/// documented DST policy before a caller sees them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("unknown timezone: {0}")]
    InvalidZone(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),
}

// ── ClockTime ─────────────────────────────────────────────────────

/// A wall-clock time of day, second resolution, no date and no zone.
///
/// Parses from `HH:MM` or `HH:MM:SS` (the two-field form is normalized
/// to zero seconds) and displays as `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8, second: u8) -> Result<Self, TemporalError> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(TemporalError::InvalidTime(format!(
                "{hour:02}:{minute:02}:{second:02}"
            )));
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    /// Seconds since local midnight, in `0..86_400`.
    pub fn second_of_day(&self) -> u32 {
        u32::from(self.hour) * 3600 + u32::from(self.minute) * 60 + u32::from(self.second)
    }

    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
        .expect("ClockTime fields are range-checked on construction")
    }

    pub fn from_naive(t: NaiveTime) -> Self {
        Self {
            hour: t.hour() as u8,
            minute: t.minute() as u8,
            second: t.second() as u8,
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl FromStr for ClockTime {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TemporalError::InvalidTime(s.to_string());
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(invalid());
        }
        let hour: u8 = parts[0].parse().map_err(|_| invalid())?;
        let minute: u8 = parts[1].parse().map_err(|_| invalid())?;
        let second: u8 = if parts.len() == 3 {
            parts[2].parse().map_err(|_| invalid())?
        } else {
            0
        };
        Self::new(hour, minute, second).map_err(|_| invalid())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Conversions ───────────────────────────────────────────────────

/// Parse an IANA zone name (e.g. `America/Los_Angeles`).
pub fn parse_zone(name: &str) -> Result<Tz, TemporalError> {
    name.parse::<Tz>()
        .map_err(|_| TemporalError::InvalidZone(name.to_string()))
}

/// Resolve a naive local datetime in `zone` to a concrete instant,
/// applying the DST policy for gaps and overlaps.
pub fn resolve_local(zone: Tz, local: NaiveDateTime) -> Result<DateTime<Tz>, TemporalError> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt),
        // Fall-back overlap: the earlier (pre-transition) instant.
        LocalResult::Ambiguous(earlier, _later) => Ok(earlier),
        // Spring-forward gap: shift forward by the size of the jump.
        // The gap size is the offset delta across the transition; real
        // zones never stack two transitions within the six-hour probe
        // window used here.
        LocalResult::None => {
            let invalid = || TemporalError::InvalidTime(local.to_string());
            let before = zone
                .offset_from_local_datetime(&(local - Duration::hours(3)))
                .earliest()
                .ok_or_else(invalid)?
                .fix()
                .local_minus_utc();
            let after = zone
                .offset_from_local_datetime(&(local + Duration::hours(3)))
                .latest()
                .ok_or_else(invalid)?
                .fix()
                .local_minus_utc();
            let gap = i64::from(after - before);
            if gap <= 0 {
                return Err(invalid());
            }
            zone.from_local_datetime(&(local + Duration::seconds(gap)))
                .earliest()
                .ok_or_else(invalid)
        }
    }
}

/// Convert a local wall-clock time in `zone` on `on_date` to the full
/// UTC instant it denotes.
pub fn local_to_utc_instant(
    time: ClockTime,
    zone: Tz,
    on_date: NaiveDate,
) -> Result<DateTime<Utc>, TemporalError> {
    let local = on_date.and_time(time.to_naive());
    Ok(resolve_local(zone, local)?.with_timezone(&Utc))
}

/// Convert a local wall-clock time in `zone` on `on_date` to its UTC
/// wall-clock counterpart (modulo the 24h clock).
pub fn local_to_utc(
    time: ClockTime,
    zone: Tz,
    on_date: NaiveDate,
) -> Result<ClockTime, TemporalError> {
    Ok(ClockTime::from_naive(
        local_to_utc_instant(time, zone, on_date)?.time(),
    ))
}

/// Inverse of [`local_to_utc`]: a UTC wall-clock time on `on_date`
/// rendered as observed in `zone`.
pub fn utc_to_local(time: ClockTime, zone: Tz, on_date: NaiveDate) -> ClockTime {
    let utc = Utc.from_utc_datetime(&on_date.and_time(time.to_naive()));
    ClockTime::from_naive(utc.with_timezone(&zone).time())
}

/// The weekday of `instant` as observed in `zone`.
pub fn weekday_in_zone(instant: DateTime<Utc>, zone: Tz) -> Weekday {
    instant.with_timezone(&zone).weekday()
}

/// The next date strictly after `after` whose weekday is in `days`.
/// Returns `None` for an empty day set.
pub fn next_weekday_date(after: NaiveDate, days: DaySet) -> Option<NaiveDate> {
    (1..=7)
        .map(|offset| after + Duration::days(offset))
        .find(|d| days.contains(d.weekday()))
}

/// The local date an alarm fires next, as observed in its own zone.
///
/// Today qualifies unless its weekday is excluded or the alarm already
/// fired today (`last_fired_on`); otherwise the next matching weekday.
/// This is the date `utc_time` must be derived at — deriving at the
/// wrong date breaks across DST transitions.
pub fn next_fire_date(
    zone: Tz,
    days: DaySet,
    now: DateTime<Utc>,
    last_fired_on: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let today = now.with_timezone(&zone).date_naive();
    let fired_today = last_fired_on.map(|d| d >= today).unwrap_or(false);
    if days.contains(today.weekday()) && !fired_today {
        Some(today)
    } else {
        next_weekday_date(today, days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    #[test]
    fn parse_accepts_both_forms() {
        assert_eq!(t("09:00"), ClockTime::new(9, 0, 0).unwrap());
        assert_eq!(t("22:30:15"), ClockTime::new(22, 30, 15).unwrap());
        assert_eq!(t("09:00").to_string(), "09:00:00");
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "9", "24:00:00", "12:60", "12:00:60", "ab:cd", "1:2:3:4"] {
            assert!(bad.parse::<ClockTime>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn second_of_day_bounds() {
        assert_eq!(t("00:00:00").second_of_day(), 0);
        assert_eq!(t("23:59:59").second_of_day(), 86_399);
    }

    #[test]
    fn la_winter_conversion() {
        // PST is UTC-8 in January.
        let zone = parse_zone("America/Los_Angeles").unwrap();
        let utc = local_to_utc(t("09:00:00"), zone, date(2025, 1, 15)).unwrap();
        assert_eq!(utc, t("17:00:00"));
    }

    #[test]
    fn round_trip_outside_transitions() {
        let zone = parse_zone("Europe/Berlin").unwrap();
        let d = date(2025, 6, 10);
        let local = t("08:45:30");
        let utc = local_to_utc(local, zone, d).unwrap();
        assert_eq!(utc_to_local(utc, zone, d), local);
    }

    #[test]
    fn spring_forward_gap_shifts_by_gap_size() {
        // 2025-03-09 02:30 does not exist in New York; the clock jumps
        // 02:00 EST -> 03:00 EDT, so 02:30 resolves to 03:30 EDT = 07:30 UTC.
        let zone = parse_zone("America/New_York").unwrap();
        let instant = local_to_utc_instant(t("02:30:00"), zone, date(2025, 3, 9)).unwrap();
        assert_eq!(instant.with_timezone(&zone).time(), t("03:30:00").to_naive());
        assert_eq!(ClockTime::from_naive(instant.time()), t("07:30:00"));
    }

    #[test]
    fn fall_back_overlap_takes_earlier_instant() {
        // 2025-11-02 01:30 occurs twice in New York; the earlier pass
        // is still EDT (UTC-4), so the UTC counterpart is 05:30.
        let zone = parse_zone("America/New_York").unwrap();
        let utc = local_to_utc(t("01:30:00"), zone, date(2025, 11, 2)).unwrap();
        assert_eq!(utc, t("05:30:00"));
    }

    #[test]
    fn weekday_observed_in_zone_not_server() {
        // 2025-01-15 03:00 UTC is Wednesday, but Los Angeles is still
        // on Tuesday evening.
        let zone = parse_zone("America/Los_Angeles").unwrap();
        let instant = Utc
            .from_utc_datetime(&date(2025, 1, 15).and_time(t("03:00:00").to_naive()));
        assert_eq!(instant.weekday(), Weekday::Wed);
        assert_eq!(weekday_in_zone(instant, zone), Weekday::Tue);
    }

    #[test]
    fn unknown_zone_is_rejected() {
        assert_eq!(
            parse_zone("Mars/Olympus_Mons"),
            Err(TemporalError::InvalidZone("Mars/Olympus_Mons".into()))
        );
    }

    #[test]
    fn next_weekday_is_strictly_after() {
        // 2025-01-13 is a Monday.
        let days: DaySet = "Mon,Wed".parse().unwrap();
        let next = next_weekday_date(date(2025, 1, 13), days).unwrap();
        assert_eq!(next, date(2025, 1, 15)); // Wednesday, not the same Monday

        let next = next_weekday_date(date(2025, 1, 15), days).unwrap();
        assert_eq!(next, date(2025, 1, 20)); // following Monday
    }

    #[test]
    fn next_weekday_empty_set_is_none() {
        assert_eq!(next_weekday_date(date(2025, 1, 13), DaySet::empty()), None);
    }

    #[test]
    fn next_fire_date_prefers_today_until_fired() {
        // 2025-01-15 18:00 UTC is Wednesday in Berlin.
        let zone = parse_zone("Europe/Berlin").unwrap();
        let now = Utc.from_utc_datetime(&date(2025, 1, 15).and_time(t("18:00:00").to_naive()));
        let days: DaySet = "Wed,Fri".parse().unwrap();

        assert_eq!(next_fire_date(zone, days, now, None), Some(date(2025, 1, 15)));
        // Already fired this Wednesday: move on to Friday.
        assert_eq!(
            next_fire_date(zone, days, now, Some(date(2025, 1, 15))),
            Some(date(2025, 1, 17))
        );
    }

    #[test]
    fn next_fire_date_uses_the_zone_local_calendar() {
        // 2025-01-15 03:00 UTC is Wednesday, but Los Angeles is still
        // on Tuesday — a Tue-only alarm fires "today" there.
        let zone = parse_zone("America/Los_Angeles").unwrap();
        let now = Utc.from_utc_datetime(&date(2025, 1, 15).and_time(t("03:00:00").to_naive()));
        let days: DaySet = "Tue".parse().unwrap();
        assert_eq!(next_fire_date(zone, days, now, None), Some(date(2025, 1, 14)));
    }

    #[test]
    fn clock_time_serde_as_string() {
        let json = serde_json::to_string(&t("07:05:00")).unwrap();
        assert_eq!(json, "\"07:05:00\"");
        let back: ClockTime = serde_json::from_str("\"07:05\"").unwrap();
        assert_eq!(back, t("07:05:00"));
    }
}
