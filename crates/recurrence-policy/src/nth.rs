//! Nth-weekday date arithmetic ("2nd Tuesday of March").

use chrono::{Datelike, NaiveDate, Weekday};

/// The date of the `n`th `weekday` in `month` of `year`.
///
/// Scans the days of the month in order and counts matches. Returns `None`
/// when the month has fewer than `n` such weekdays, when `n` is zero, or when
/// `year`/`month` do not form a valid month.
///
/// ```
/// use chrono::{NaiveDate, Weekday};
/// use recurrence_policy::first_nth_weekday;
///
/// assert_eq!(
///     first_nth_weekday(2025, 3, Weekday::Mon, 2),
///     NaiveDate::from_ymd_opt(2025, 3, 10)
/// );
/// assert_eq!(first_nth_weekday(2025, 2, Weekday::Mon, 5), None);
/// ```
pub fn first_nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    if n == 0 {
        return None;
    }

    let mut seen = 0;
    for day in 1..=31 {
        // Days past the end of the month are invalid dates.
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        if date.weekday() == weekday {
            seen += 1;
            if seen == n {
                return Some(date);
            }
        }
    }
    None
}
