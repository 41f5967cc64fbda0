//! Observance policy for occurrences that land on weekends or holidays.
//!
//! Holiday data is external: callers plug in a [`HolidayCalendar`] keyed by ISO
//! country code. Without one ([`NoHolidays`]) the holiday-shift flag is a no-op.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::options::{date_key, RecurrenceOptions};

/// Occurrences are never moved further than this many days.
pub const MAX_SHIFT_DAYS: i64 = 7;

/// What to do with an occurrence that lands on an excluded (weekend/holiday) day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observance {
    /// Keep the occurrence where it is.
    #[default]
    None,
    /// Drop the occurrence.
    Skip,
    /// Move to the next business day.
    NextBusinessDay,
    /// Move to the previous business day.
    PreviousBusinessDay,
    /// Saturday moves back to Friday, Sunday and holidays move forward.
    Nearest,
}

/// Source of public holidays, keyed by ISO country/locale code.
pub trait HolidayCalendar {
    fn is_holiday(&self, iso_code: &str, date: NaiveDate) -> bool;
}

/// A calendar with no holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn is_holiday(&self, _iso_code: &str, _date: NaiveDate) -> bool {
        false
    }
}

/// In-memory holiday table, one set of [`date_key`] values per ISO code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedHolidays {
    calendars: HashMap<String, BTreeSet<u32>>,
}

impl FixedHolidays {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dates(mut self, iso_code: &str, dates: &[NaiveDate]) -> Self {
        self.calendars
            .entry(iso_code.to_uppercase())
            .or_default()
            .extend(dates.iter().copied().map(date_key));
        self
    }
}

impl HolidayCalendar for FixedHolidays {
    fn is_holiday(&self, iso_code: &str, date: NaiveDate) -> bool {
        self.calendars
            .get(&iso_code.to_uppercase())
            .is_some_and(|days| days.contains(&date_key(date)))
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_holiday(options: &RecurrenceOptions, holidays: &dyn HolidayCalendar, date: NaiveDate) -> bool {
    options.shift_holidays
        && options
            .iso_code
            .as_deref()
            .is_some_and(|code| holidays.is_holiday(code, date))
}

fn is_off_day(options: &RecurrenceOptions, holidays: &dyn HolidayCalendar, date: NaiveDate) -> bool {
    (options.shift_weekends && is_weekend(date)) || is_holiday(options, holidays, date)
}

fn step_to_business_day(
    options: &RecurrenceOptions,
    holidays: &dyn HolidayCalendar,
    start: DateTime<Utc>,
    step: i64,
) -> Option<DateTime<Utc>> {
    (1..=MAX_SHIFT_DAYS)
        .filter_map(|n| start.checked_add_signed(Duration::days(n * step)))
        .find(|candidate| !is_off_day(options, holidays, candidate.date_naive()))
}

/// Apply the observance policy to one raw occurrence start.
///
/// Returns `None` when the occurrence is dropped, either by [`Observance::Skip`]
/// or because no business day exists within [`MAX_SHIFT_DAYS`].
pub fn observe(
    options: &RecurrenceOptions,
    holidays: &dyn HolidayCalendar,
    start: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let date = start.date_naive();
    if !is_off_day(options, holidays, date) {
        return Some(start);
    }

    match options.observance {
        Observance::None => Some(start),
        Observance::Skip => None,
        Observance::NextBusinessDay => step_to_business_day(options, holidays, start, 1),
        Observance::PreviousBusinessDay => step_to_business_day(options, holidays, start, -1),
        Observance::Nearest => {
            let backwards = options.shift_weekends
                && date.weekday() == Weekday::Sat
                && !is_holiday(options, holidays, date);
            if backwards {
                step_to_business_day(options, holidays, start, -1)
            } else {
                step_to_business_day(options, holidays, start, 1)
            }
        }
    }
}
