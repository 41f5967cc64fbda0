//! Local hour-of-day ranges converted to UTC hour sets.
//!
//! Rules store hours in UTC. A local range such as 22:00-02:00 in
//! `Asia/Tokyo` becomes a UTC range that may wrap past 23 -> 0; the set is
//! still contiguous in wall-clock terms.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// A UTC hour set derived from a local start/end hour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtcHours {
    /// UTC hour of the local start hour.
    pub start: u8,
    /// Hours in ascending order. Holds only `start` when no end hour was given.
    pub hours: Vec<u8>,
}

/// Hours from `start` (inclusive) to `end` (exclusive), wrapping past midnight.
///
/// The result is sorted ascending; its length is `(end - start) mod 24`, so
/// equal bounds give an empty set.
pub fn hours_between(start: u8, end: u8) -> Vec<u8> {
    let start = start % 24;
    let end = end % 24;
    let mut hours: Vec<u8> = if start <= end {
        (start..end).collect()
    } else {
        (start..24).chain(0..end).collect()
    };
    hours.sort_unstable();
    hours
}

/// The UTC instant of `hour:00` local time on `date` in `tz`.
///
/// Local times inside a DST gap resolve to the first valid instant after it.
fn to_utc(tz: Tz, date: NaiveDate, hour: u8) -> Option<DateTime<Utc>> {
    let local = date.and_hms_opt(u32::from(hour % 24), 0, 0)?;
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// The UTC hour-of-day of `hour:00` local time on `date` in `tz`.
///
/// Local times inside a DST gap resolve to the first valid instant after it.
pub fn to_utc_hour(tz: Tz, date: NaiveDate, hour: u8) -> u8 {
    match to_utc(tz, date, hour) {
        Some(dt) => dt.hour() as u8,
        None => hour % 24,
    }
}

/// Each local hour of the window starting at `start` on `date`, as its UTC
/// hour paired with the UTC day it lands on relative to `date` (-1, 0 or 1).
///
/// Local hours past midnight belong to the day after `date`, so a 22:00-02:00
/// window stays one contiguous wall-clock stretch.
pub fn utc_day_offsets(tz: Tz, date: NaiveDate, start: u8, end: Option<u8>) -> Vec<(u8, i64)> {
    let start = start % 24;
    let span = match end {
        Some(end) => (i16::from(end % 24) - i16::from(start)).rem_euclid(24) as u8,
        None => 1,
    };

    (0..span)
        .filter_map(|i| {
            let local_hour = start + i;
            let local_date = if local_hour >= 24 { date.succ_opt()? } else { date };
            let utc = to_utc(tz, local_date, local_hour % 24)?;
            let offset = utc.date_naive().signed_duration_since(date).num_days().clamp(-1, 1);
            Some((utc.hour() as u8, offset))
        })
        .collect()
}

/// Convert a local start hour and optional end hour on `date` to UTC.
pub fn utc_hour_set(tz: Tz, date: NaiveDate, start: u8, end: Option<u8>) -> UtcHours {
    let utc_start = to_utc_hour(tz, date, start);
    let hours = match end {
        Some(end) => hours_between(utc_start, to_utc_hour(tz, date, end)),
        None => vec![utc_start],
    };
    UtcHours {
        start: utc_start,
        hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn plain_range_in_utc() {
        assert_eq!(hours_between(9, 17), (9..17).collect::<Vec<u8>>());
    }

    #[test]
    fn range_wraps_past_midnight() {
        assert_eq!(hours_between(22, 2), vec![0, 1, 22, 23]);
    }

    #[test]
    fn equal_bounds_are_empty() {
        assert!(hours_between(5, 5).is_empty());
    }

    #[test]
    fn tokyo_business_hours_shift_into_previous_utc_day() {
        // 09:00-18:00 JST (UTC+9) is 00:00-09:00 UTC.
        let set = utc_hour_set(chrono_tz::Asia::Tokyo, jan1(), 9, Some(18));
        assert_eq!(set.start, 0);
        assert_eq!(set.hours, (0..9).collect::<Vec<u8>>());
    }

    #[test]
    fn new_york_evening_wraps_in_utc() {
        // 18:00-23:00 EST (UTC-5) is 23:00-04:00 UTC.
        let set = utc_hour_set(chrono_tz::America::New_York, jan1(), 18, Some(23));
        assert_eq!(set.start, 23);
        assert_eq!(set.hours, vec![0, 1, 2, 3, 23]);
    }

    #[test]
    fn new_york_evening_rolls_into_next_utc_day() {
        // Monday 18:00 EST is Monday 23:00 UTC; 19:00-22:00 EST fall on Tuesday UTC.
        let offsets = utc_day_offsets(chrono_tz::America::New_York, jan1(), 18, Some(23));
        assert_eq!(offsets, vec![(23, 0), (0, 1), (1, 1), (2, 1), (3, 1)]);
    }

    #[test]
    fn tokyo_early_morning_falls_on_previous_utc_day() {
        // 08:00 JST is 23:00 UTC the day before.
        let offsets = utc_day_offsets(chrono_tz::Asia::Tokyo, jan1(), 8, Some(10));
        assert_eq!(offsets, vec![(23, -1), (0, 0)]);
    }

    #[test]
    fn local_midnight_wrap_counts_from_the_next_local_day() {
        let offsets = utc_day_offsets(Tz::UTC, jan1(), 22, Some(2));
        assert_eq!(offsets, vec![(22, 0), (23, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn missing_end_keeps_single_start_hour() {
        let set = utc_hour_set(chrono_tz::Europe::Berlin, jan1(), 8, None);
        assert_eq!(set.hours, vec![7]);
    }
}
