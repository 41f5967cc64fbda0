//! Occurrence expansion -- turns [`RecurrenceOptions`] into concrete start instants.
//!
//! Wraps the `rrule` crate (v0.13): options are compiled into an `RRuleSet`
//! anchored in UTC, then enumerated over a bounded window. Exclusion dates and
//! observance shifting are applied on top of the raw RFC 5545 occurrences.

use chrono::{DateTime, Datelike, Duration, Month, Utc, Weekday};
use rrule::{NWeekday, RRule, RRuleSet, Tz, Unvalidated};

use crate::error::{PolicyError, Result};
use crate::holiday::{self, HolidayCalendar, MAX_SHIFT_DAYS};
use crate::options::{RecurrenceOptions, WeekdaySpec};

/// Upper bound on occurrences inspected inside one `[from, to]` window.
/// Occurrences before the window are skipped without counting against it.
const SCAN_LIMIT: usize = 10_000;

/// `rrule` generates no occurrences past this year.
const LAST_YEAR: i32 = 9999;

/// `instant + span`, saturating at [`DateTime::<Utc>::MAX_UTC`].
pub(crate) fn add_clamped(instant: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    instant
        .checked_add_signed(span)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `instant - span`, saturating at [`DateTime::<Utc>::MIN_UTC`].
pub(crate) fn sub_clamped(instant: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    instant
        .checked_sub_signed(span)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn rotate(weekday: Weekday, offset: i64) -> Weekday {
    match offset {
        o if o > 0 => weekday.succ(),
        o if o < 0 => weekday.pred(),
        _ => weekday,
    }
}

fn rule_for(
    options: &RecurrenceOptions,
    hours: &[u8],
    day_offset: i64,
) -> Result<RRule<Unvalidated>> {
    let mut rule = RRule::new(options.frequency.into()).interval(options.interval.max(1));

    if let Some(count) = options.count {
        rule = rule.count(count);
    }
    if let Some(until) = options.until {
        rule = rule.until(until.with_timezone(&Tz::UTC));
    }
    if !options.by_second.is_empty() {
        rule = rule.by_second(options.by_second.clone());
    }
    if !options.by_minute.is_empty() {
        rule = rule.by_minute(options.by_minute.clone());
    }
    if !hours.is_empty() {
        rule = rule.by_hour(hours.to_vec());
    }
    if !options.by_weekday.is_empty() {
        let weekdays: Vec<NWeekday> = options
            .by_weekday
            .iter()
            .map(|&w| WeekdaySpec { weekday: rotate(w.weekday, day_offset), ..w }.into())
            .collect();
        rule = rule.by_weekday(weekdays);
    }
    if !options.by_month_day.is_empty() {
        rule = rule.by_month_day(options.by_month_day.clone());
    }
    if !options.by_year_day.is_empty() {
        rule = rule.by_year_day(options.by_year_day.clone());
    }
    if !options.by_week_no.is_empty() {
        rule = rule.by_week_no(options.by_week_no.clone());
    }
    if !options.by_month.is_empty() {
        let months = options
            .by_month
            .iter()
            .map(|&m| {
                Month::try_from(m).map_err(|_| PolicyError::InvalidRule(format!("month {m}")))
            })
            .collect::<Result<Vec<Month>>>()?;
        rule = rule.by_month(&months);
    }
    if !options.by_set_pos.is_empty() {
        rule = rule.by_set_pos(options.by_set_pos.clone());
    }
    if let Some(offset) = options.by_easter {
        rule = rule.by_easter(offset);
    }
    Ok(rule)
}

/// Compile options into an `rrule` set anchored at `dt_start` (UTC).
///
/// Hours that roll over into a neighbouring UTC day get their own rule with
/// the weekdays rotated by that day, so a local evening window keeps its
/// local weekday.
///
/// # Errors
/// Returns `PolicyError::InvalidRule` if a month number is out of range or the
/// `rrule` crate rejects the combination of BY* parts.
pub fn compile(options: &RecurrenceOptions) -> Result<RRuleSet> {
    let dt_start = options.dt_start.with_timezone(&Tz::UTC);
    let invalid = |e: rrule::RRuleError| PolicyError::InvalidRule(e.to_string());

    let mut set = RRuleSet::new(dt_start);
    for (offset, hours) in options.hour_groups() {
        let rule = rule_for(options, &hours, offset)?
            .validate(dt_start)
            .map_err(invalid)?;
        set = set.rrule(rule);
    }
    Ok(set)
}

/// Effective occurrence starts within `[from, to]`, sorted and deduplicated.
///
/// Raw occurrences on an excluded date are dropped; the rest go through the
/// observance policy. When shifting is possible the raw window is widened by
/// [`MAX_SHIFT_DAYS`] on both sides so shifted occurrences are not missed.
///
/// # Errors
/// Returns `PolicyError::InvalidRule` if the options do not compile.
pub fn occurrences_between(
    options: &RecurrenceOptions,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    holidays: &dyn HolidayCalendar,
) -> Result<Vec<DateTime<Utc>>> {
    if from > to {
        return Ok(Vec::new());
    }

    let widen = if options.shifts_occurrences() {
        Duration::days(MAX_SHIFT_DAYS)
    } else {
        Duration::zero()
    };
    let raw_from = sub_clamped(from, widen);
    let raw_to = add_clamped(to, widen);
    let set = compile(options)?;
    if raw_from.year() > LAST_YEAR {
        return Ok(Vec::new());
    }

    // The iterator ignores `RRuleSet::after`, so skip the pre-window
    // occurrences by hand before applying the cap.
    let raw_window = set
        .into_iter()
        .map(|raw| raw.with_timezone(&Utc))
        .skip_while(|raw| *raw < raw_from)
        .take_while(|raw| *raw <= raw_to)
        .take(SCAN_LIMIT);

    let mut starts: Vec<DateTime<Utc>> = Vec::new();
    for raw in raw_window {
        if options.is_excluded(raw.date_naive()) {
            continue;
        }
        if let Some(start) = holiday::observe(options, holidays, raw) {
            if start >= from && start <= to {
                starts.push(start);
            }
        }
    }

    starts.sort();
    starts.dedup();
    Ok(starts)
}
