//! The canonical alarm model shared by the store, the scheduler index,
//! and the HTTP façade.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;
use crate::temporal::ClockTime;

// ── Status ────────────────────────────────────────────────────────

/// Alarm lifecycle status.
///
/// `scheduled` rows (and only those) are mirrored into the in-memory
/// time index. `triggered` is terminal for one-shot alarms; recurring
/// alarms stay `scheduled` across occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmStatus {
    Scheduled,
    Triggered,
    Canceled,
    Failed,
}

impl AlarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Triggered => "triggered",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "triggered" => Ok(Self::Triggered),
            "canceled" => Ok(Self::Canceled),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown alarm status: {other}")),
        }
    }
}

// ── DaySet ────────────────────────────────────────────────────────

const DAY_ORDER: [(Weekday, &str); 7] = [
    (Weekday::Mon, "Mon"),
    (Weekday::Tue, "Tue"),
    (Weekday::Wed, "Wed"),
    (Weekday::Thu, "Thu"),
    (Weekday::Fri, "Fri"),
    (Weekday::Sat, "Sat"),
    (Weekday::Sun, "Sun"),
];

/// A set of weekdays, stored as one bit per day.
///
/// Parses from and renders to the comma-joined short-name form
/// (`"Mon,Wed,Fri"`) used on the wire and in the `alarms` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySet(u8);

impl DaySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self(0b0111_1111)
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        DAY_ORDER
            .iter()
            .filter(|(day, _)| self.contains(*day))
            .map(|(day, _)| *day)
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (day, name) in DAY_ORDER {
            if self.contains(day) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for DaySet {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::empty();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let day = DAY_ORDER
                .iter()
                .find(|(_, name)| name.eq_ignore_ascii_case(part))
                .map(|(day, _)| *day)
                .ok_or_else(|| ValidationError::InvalidDays(part.to_string()))?;
            set.insert(day);
        }
        Ok(set)
    }
}

impl Serialize for DaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Alarm ─────────────────────────────────────────────────────────

/// The canonical scheduled unit, as persisted in the store.
///
/// `utc_time` is derived from `local_time` + `timezone` at the date of
/// the next firing and re-derived per occurrence — it shifts across
/// DST transitions. `last_fired_on` holds the local occurrence date of
/// the most recent fire and backs the cross-replica claim.
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub code_id: String,
    pub email: String,
    pub local_time: ClockTime,
    pub utc_time: ClockTime,
    pub timezone: Tz,
    pub is_recurring: bool,
    pub days_of_week: DaySet,
    pub status: AlarmStatus,
    pub last_fired_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Syntactic email check: a single `@` with non-empty local and domain
/// parts, a dotted domain, and no whitespace. Deliverability is the
/// mail layer's problem.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidEmail(email.to_string());
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_set_round_trip() {
        let set: DaySet = "Mon,Wed,Fri".parse().unwrap();
        assert_eq!(set.to_string(), "Mon,Wed,Fri");
        assert_eq!(set.len(), 3);
        assert!(set.contains(Weekday::Wed));
        assert!(!set.contains(Weekday::Sun));
    }

    #[test]
    fn day_set_parse_is_case_insensitive_and_order_free() {
        let set: DaySet = "sun, mon".parse().unwrap();
        assert_eq!(set.to_string(), "Mon,Sun");
    }

    #[test]
    fn day_set_rejects_unknown_names() {
        assert!("Mon,Funday".parse::<DaySet>().is_err());
    }

    #[test]
    fn day_set_all_covers_week() {
        let all = DaySet::all();
        assert_eq!(all.len(), 7);
        assert_eq!(all.to_string(), "Mon,Tue,Wed,Thu,Fri,Sat,Sun");
        assert_eq!("Mon,Tue,Wed,Thu,Fri,Sat,Sun".parse::<DaySet>().unwrap(), all);
    }

    #[test]
    fn status_round_trip() {
        for status in [
            AlarmStatus::Scheduled,
            AlarmStatus::Triggered,
            AlarmStatus::Canceled,
            AlarmStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<AlarmStatus>().unwrap(), status);
        }
        assert!("armed".parse::<AlarmStatus>().is_err());
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("a.b+c@mail.example.org").is_ok());
        for bad in ["", "user", "@example.com", "user@", "user@nodot", "a b@x.com", "u@@x.com"] {
            assert!(validate_email(bad).is_err(), "accepted {bad:?}");
        }
    }
}
