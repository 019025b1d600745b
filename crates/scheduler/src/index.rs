//! The second-of-day alarm index.
//!
//! A flat array of 86 400 buckets (one per UTC second of day), each
//! holding the set of alarm ids due in that second, plus a reverse map
//! for O(1) removal. Empty buckets are just empty sets; the whole
//! structure is bounded and cache-friendly.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono_tz::Tz;
use serde::Serialize;

use wecker_core::alarm::{Alarm, DaySet};
use wecker_core::temporal::ClockTime;

pub const SECONDS_PER_DAY: u32 = 86_400;

/// The subset of an alarm's fields the scheduler caches.
///
/// Enough to run the weekday gate and build the trigger event without a
/// store round-trip; everything else stays authoritative in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmProjection {
    pub code_id: String,
    pub email: String,
    pub timezone: Tz,
    pub local_time: ClockTime,
    pub days_of_week: DaySet,
    pub is_recurring: bool,
}

impl From<&Alarm> for AlarmProjection {
    fn from(alarm: &Alarm) -> Self {
        Self {
            code_id: alarm.code_id.clone(),
            email: alarm.email.clone(),
            timezone: alarm.timezone,
            local_time: alarm.local_time,
            days_of_week: alarm.days_of_week,
            is_recurring: alarm.is_recurring,
        }
    }
}

#[derive(Debug)]
struct IndexedAlarm {
    second_of_day: u32,
    projection: AlarmProjection,
}

/// Snapshot of index shape for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_alarms: usize,
    pub occupied_slots: usize,
    /// Alarm count per UTC hour of day.
    pub per_hour: Vec<usize>,
}

/// Second-of-day → due alarm ids, with a reverse map for O(1) removal.
pub struct TimeIndex {
    slots: Vec<HashSet<String>>,
    by_id: HashMap<String, IndexedAlarm>,
}

impl TimeIndex {
    pub fn new() -> Self {
        Self {
            slots: vec![HashSet::new(); SECONDS_PER_DAY as usize],
            by_id: HashMap::new(),
        }
    }

    /// Insert or re-key an alarm at the given UTC wall-clock second.
    ///
    /// Idempotent: re-adding an id at its current key is a no-op;
    /// adding it at a different key moves it (remove + insert). The
    /// projection is refreshed either way.
    pub fn add(&mut self, projection: AlarmProjection, utc_time: ClockTime) {
        let second = utc_time.second_of_day();
        let code_id = projection.code_id.clone();

        if let Some(existing) = self.by_id.get_mut(&code_id) {
            if existing.second_of_day == second {
                existing.projection = projection;
                return;
            }
            let old = existing.second_of_day;
            self.slots[old as usize].remove(&code_id);
            existing.second_of_day = second;
            existing.projection = projection;
        } else {
            self.by_id.insert(
                code_id.clone(),
                IndexedAlarm {
                    second_of_day: second,
                    projection,
                },
            );
        }
        self.slots[second as usize].insert(code_id);
    }

    /// Remove an alarm. Returns whether it was present.
    pub fn remove(&mut self, code_id: &str) -> bool {
        match self.by_id.remove(code_id) {
            Some(entry) => {
                self.slots[entry.second_of_day as usize].remove(code_id);
                true
            }
            None => false,
        }
    }

    /// The UTC second an alarm is currently keyed at, if indexed.
    pub fn slot_of(&self, code_id: &str) -> Option<u32> {
        self.by_id.get(code_id).map(|e| e.second_of_day)
    }

    pub fn contains(&self, code_id: &str) -> bool {
        self.by_id.contains_key(code_id)
    }

    /// Snapshot the projections due at `second_of_day`.
    ///
    /// Returns owned copies so the caller can iterate without holding
    /// the index guard.
    pub fn due(&self, second_of_day: u32) -> Vec<AlarmProjection> {
        self.slots[(second_of_day % SECONDS_PER_DAY) as usize]
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .map(|e| e.projection.clone())
            .collect()
    }

    /// All indexed code ids (reconciliation input).
    pub fn code_ids(&self) -> Vec<String> {
        self.by_id.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let mut per_hour = vec![0usize; 24];
        let mut occupied = 0usize;
        for (second, slot) in self.slots.iter().enumerate() {
            if !slot.is_empty() {
                occupied += 1;
                per_hour[second / 3600] += slot.len();
            }
        }
        IndexStats {
            total_alarms: self.by_id.len(),
            occupied_slots: occupied,
            per_hour,
        }
    }
}

impl Default for TimeIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Many concurrent due-lookups, exclusive mutation.
pub type SharedIndex = Arc<RwLock<TimeIndex>>;

pub fn new_shared_index() -> SharedIndex {
    Arc::new(RwLock::new(TimeIndex::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection(code_id: &str) -> AlarmProjection {
        AlarmProjection {
            code_id: code_id.to_string(),
            email: "user@example.com".to_string(),
            timezone: chrono_tz::UTC,
            local_time: "12:00:00".parse().unwrap(),
            days_of_week: DaySet::all(),
            is_recurring: false,
        }
    }

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    #[test]
    fn add_and_due() {
        let mut index = TimeIndex::new();
        index.add(projection("A1"), t("12:00:00"));
        index.add(projection("A2"), t("12:00:00"));
        index.add(projection("B1"), t("12:00:01"));

        let due = index.due(t("12:00:00").second_of_day());
        let ids: HashSet<_> = due.iter().map(|p| p.code_id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["A1", "A2"]));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn re_add_same_key_is_noop() {
        let mut index = TimeIndex::new();
        index.add(projection("A1"), t("12:00:00"));
        index.add(projection("A1"), t("12:00:00"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.due(t("12:00:00").second_of_day()).len(), 1);
    }

    #[test]
    fn re_add_new_key_moves() {
        let mut index = TimeIndex::new();
        index.add(projection("A1"), t("12:00:00"));
        index.add(projection("A1"), t("13:30:00"));

        assert_eq!(index.len(), 1);
        assert!(index.due(t("12:00:00").second_of_day()).is_empty());
        assert_eq!(index.due(t("13:30:00").second_of_day()).len(), 1);
        assert_eq!(index.slot_of("A1"), Some(t("13:30:00").second_of_day()));
    }

    #[test]
    fn remove_is_o1_and_idempotent() {
        let mut index = TimeIndex::new();
        index.add(projection("A1"), t("06:15:00"));
        assert!(index.remove("A1"));
        assert!(!index.remove("A1"));
        assert!(index.due(t("06:15:00").second_of_day()).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn stats_sum_matches_population() {
        // The sum of leaf-set sizes must equal the indexed population.
        let mut index = TimeIndex::new();
        for i in 0..10 {
            index.add(projection(&format!("A{i}")), t("08:00:00"));
        }
        for i in 0..5 {
            index.add(projection(&format!("B{i}")), t("08:00:05"));
        }
        index.add(projection("C0"), t("21:59:59"));

        let stats = index.stats();
        assert_eq!(stats.total_alarms, 16);
        assert_eq!(stats.occupied_slots, 3);
        assert_eq!(stats.per_hour.iter().sum::<usize>(), 16);
        assert_eq!(stats.per_hour[8], 15);
        assert_eq!(stats.per_hour[21], 1);
    }

    #[test]
    fn due_snapshot_is_detached() {
        let mut index = TimeIndex::new();
        index.add(projection("A1"), t("12:00:00"));
        let due = index.due(t("12:00:00").second_of_day());
        index.remove("A1");
        // The snapshot survives mutation.
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].code_id, "A1");
    }
}
