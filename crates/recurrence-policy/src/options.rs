//! Calendar-constraint value object consumed by the expander.
//!
//! [`RecurrenceOptions`] mirrors the RFC 5545 RRULE parts (frequency, interval,
//! BY* sets) plus the observance settings that decide what happens when an
//! occurrence lands on an excluded day. Hour values are always stored in UTC.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::holiday::Observance;

/// Recurrence frequency, ordered from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<Frequency> for rrule::Frequency {
    fn from(freq: Frequency) -> Self {
        match freq {
            Frequency::Secondly => rrule::Frequency::Secondly,
            Frequency::Minutely => rrule::Frequency::Minutely,
            Frequency::Hourly => rrule::Frequency::Hourly,
            Frequency::Daily => rrule::Frequency::Daily,
            Frequency::Weekly => rrule::Frequency::Weekly,
            Frequency::Monthly => rrule::Frequency::Monthly,
            Frequency::Yearly => rrule::Frequency::Yearly,
        }
    }
}

/// A BYDAY entry: either every matching weekday, or the nth one within the
/// period ("2nd Tuesday" is `nth = Some(2)`, "last Friday" is `nth = Some(-1)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekdaySpec {
    pub weekday: Weekday,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<i16>,
}

impl WeekdaySpec {
    pub fn every(weekday: Weekday) -> Self {
        Self { weekday, nth: None }
    }

    pub fn nth(nth: i16, weekday: Weekday) -> Self {
        Self {
            weekday,
            nth: Some(nth),
        }
    }
}

impl From<WeekdaySpec> for rrule::NWeekday {
    fn from(spec: WeekdaySpec) -> Self {
        match spec.nth {
            Some(n) => rrule::NWeekday::Nth(n, spec.weekday),
            None => rrule::NWeekday::Every(spec.weekday),
        }
    }
}

/// Key used by exclusion sets: `year * 10000 + month * 100 + day`.
///
/// Years before 0 CE collapse to year 0.
pub fn date_key(date: NaiveDate) -> u32 {
    let year = u32::try_from(date.year()).unwrap_or(0);
    year * 10_000 + date.month() * 100 + date.day()
}

/// Calendar constraints for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceOptions {
    pub frequency: Frequency,
    /// Always at least 1.
    pub interval: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Anchor instant the pattern is computed from (RFC 5545 DTSTART).
    pub dt_start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_second: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_minute: Vec<u8>,
    /// UTC hours of day.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_hour: Vec<u8>,
    /// Subset of `by_hour` that falls on the UTC day after the local weekday.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_day_hours: Vec<u8>,
    /// Subset of `by_hour` that falls on the UTC day before the local weekday.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_day_hours: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_weekday: Vec<WeekdaySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month_day: Vec<i8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_year_day: Vec<i16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_week_no: Vec<i8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_set_pos: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_easter: Option<i16>,

    #[serde(default)]
    pub shift_weekends: bool,
    #[serde(default)]
    pub shift_holidays: bool,
    #[serde(default)]
    pub observance: Observance,
    /// ISO country/locale code resolving the holiday calendar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    /// Dates (as [`date_key`] values) on which occurrences are dropped.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclusions: BTreeSet<u32>,
}

impl RecurrenceOptions {
    pub fn new(frequency: Frequency, dt_start: DateTime<Utc>) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            dt_start,
            until: None,
            by_second: Vec::new(),
            by_minute: Vec::new(),
            by_hour: Vec::new(),
            next_day_hours: Vec::new(),
            previous_day_hours: Vec::new(),
            by_weekday: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_month: Vec::new(),
            by_set_pos: Vec::new(),
            by_easter: None,
            shift_weekends: false,
            shift_holidays: false,
            observance: Observance::default(),
            iso_code: None,
            exclusions: BTreeSet::new(),
        }
    }

    pub fn is_excluded(&self, date: NaiveDate) -> bool {
        self.exclusions.contains(&date_key(date))
    }

    /// `by_hour` grouped by the UTC day offset each hour carries relative to
    /// the weekday it was declared on. Only `Every` weekdays are rotated; with
    /// ordinal weekdays or no weekdays at all every hour stays on offset 0.
    pub fn hour_groups(&self) -> Vec<(i64, Vec<u8>)> {
        let rotates = !self.by_weekday.is_empty() && self.by_weekday.iter().all(|w| w.nth.is_none());
        if !rotates || (self.next_day_hours.is_empty() && self.previous_day_hours.is_empty()) {
            return vec![(0, self.by_hour.clone())];
        }

        let pick = |offset: i64| -> Vec<u8> {
            self.by_hour
                .iter()
                .copied()
                .filter(|h| match offset {
                    1 => self.next_day_hours.contains(h),
                    -1 => self.previous_day_hours.contains(h),
                    _ => !self.next_day_hours.contains(h) && !self.previous_day_hours.contains(h),
                })
                .collect()
        };
        [-1, 0, 1]
            .into_iter()
            .map(|offset| (offset, pick(offset)))
            .filter(|(_, hours)| !hours.is_empty())
            .collect()
    }

    /// Whether any observance shifting can move an occurrence.
    pub fn shifts_occurrences(&self) -> bool {
        (self.shift_weekends || self.shift_holidays) && self.observance != Observance::None
    }
}
