//! Tests for rule construction: per-kind defaults, hour-range conversion,
//! clamping and the fallible build path.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use recurrence_policy::{
    DurationUnit, Frequency, NoHolidays, Polarity, PolicyError, RuleBuilder, WeekdaySpec,
};

const WORKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Month-day
// ---------------------------------------------------------------------------

#[test]
fn month_day_yearly_derives_month_and_day() {
    let policy = RuleBuilder::month_day(utc(2025, 12, 25, 0, 0), Frequency::Yearly).build();

    assert_eq!(policy.options.frequency, Frequency::Yearly);
    assert_eq!(policy.options.by_month, vec![12]);
    assert_eq!(policy.options.by_month_day, vec![25]);
    assert_eq!(policy.options.dt_start, utc(2025, 12, 25, 0, 0));
}

#[test]
fn month_day_coerces_other_frequencies_to_monthly() {
    let policy = RuleBuilder::month_day(utc(2025, 1, 15, 12, 0), Frequency::Weekly).build();

    assert_eq!(policy.options.frequency, Frequency::Monthly);
    assert_eq!(policy.options.by_month, vec![1]);
    assert_eq!(policy.options.by_month_day, vec![15]);
}

#[test]
fn month_day_monthly_keeps_anchor_month() {
    let policy = RuleBuilder::month_day(utc(2025, 1, 15, 12, 0), Frequency::Monthly).build();
    let starts = policy
        .occurrences_between(utc(2025, 1, 1, 0, 0), utc(2026, 4, 1, 0, 0), &NoHolidays)
        .unwrap();

    assert_eq!(starts, vec![utc(2025, 1, 15, 12, 0), utc(2026, 1, 15, 12, 0)]);
}

#[test]
fn month_day_every_month_recurs_each_month() {
    let policy = RuleBuilder::month_day(utc(2025, 1, 15, 12, 0), Frequency::Monthly)
        .every_month()
        .build();
    assert!(policy.options.by_month.is_empty());

    let starts = policy
        .occurrences_between(utc(2025, 1, 1, 0, 0), utc(2025, 4, 1, 0, 0), &NoHolidays)
        .unwrap();
    assert_eq!(
        starts,
        vec![
            utc(2025, 1, 15, 12, 0),
            utc(2025, 2, 15, 12, 0),
            utc(2025, 3, 15, 12, 0),
        ]
    );
}

#[test]
fn month_day_every_month_still_honours_month_selectors() {
    let policy = RuleBuilder::month_day(utc(2025, 1, 15, 12, 0), Frequency::Monthly)
        .every_month()
        .march()
        .build();
    assert_eq!(policy.options.by_month, vec![3]);
}

// ---------------------------------------------------------------------------
// Weekday
// ---------------------------------------------------------------------------

#[test]
fn weekday_range_in_utc() {
    let policy = RuleBuilder::weekday(2025, &WORKDAYS, 9, Some(17)).build();

    assert_eq!(policy.options.frequency, Frequency::Weekly);
    assert_eq!(policy.options.by_hour, (9..17).collect::<Vec<u8>>());
    assert_eq!(
        policy.options.by_weekday,
        WORKDAYS.iter().copied().map(WeekdaySpec::every).collect::<Vec<_>>()
    );
    assert_eq!(policy.options.dt_start, utc(2025, 1, 1, 9, 0));
    assert_eq!(policy.unit, DurationUnit::Hour);
    assert_eq!(policy.duration, 1);
}

#[test]
fn weekday_range_is_normalized_to_utc() {
    // 09:00-18:00 in Tokyo (UTC+9) is 00:00-09:00 UTC.
    let policy = RuleBuilder::weekday(2025, &WORKDAYS, 9, Some(18))
        .timezone("Asia/Tokyo")
        .build();

    assert_eq!(policy.options.by_hour, (0..9).collect::<Vec<u8>>());
    assert_eq!(policy.options.dt_start, utc(2025, 1, 1, 0, 0));
}

#[test]
fn weekday_range_wraps_past_midnight_in_utc() {
    // 18:00-23:00 in New York (UTC-5 in January) is 23:00-04:00 UTC.
    let policy = RuleBuilder::weekday(2025, &WORKDAYS, 18, Some(23))
        .timezone("America/New_York")
        .build();

    assert_eq!(policy.options.by_hour, vec![0, 1, 2, 3, 23]);
    assert_eq!(policy.options.next_day_hours, vec![0, 1, 2, 3]);
    assert!(policy.options.previous_day_hours.is_empty());
    assert_eq!(policy.options.dt_start.hour(), 23);
}

#[test]
fn weekday_evening_keeps_its_local_weekday() {
    // Monday 18:00-23:00 New York: 23:00 UTC Monday, then 00:00-03:00 UTC Tuesday.
    let policy = RuleBuilder::weekday(2025, &[Weekday::Mon], 18, Some(23))
        .timezone("America/New_York")
        .build();
    let starts = policy
        .occurrences_between(utc(2025, 3, 2, 0, 0), utc(2025, 3, 5, 0, 0), &NoHolidays)
        .unwrap();

    assert_eq!(
        starts,
        vec![
            utc(2025, 3, 3, 23, 0),
            utc(2025, 3, 4, 0, 0),
            utc(2025, 3, 4, 1, 0),
            utc(2025, 3, 4, 2, 0),
            utc(2025, 3, 4, 3, 0),
        ]
    );
}

#[test]
fn weekday_early_morning_east_of_utc_starts_the_day_before() {
    // Monday 08:00-10:00 Tokyo is Sunday 23:00 UTC and Monday 00:00 UTC.
    let policy = RuleBuilder::weekday(2025, &[Weekday::Mon], 8, Some(10))
        .timezone("Asia/Tokyo")
        .build();
    assert_eq!(policy.options.previous_day_hours, vec![23]);

    let starts = policy
        .occurrences_between(utc(2025, 3, 2, 0, 0), utc(2025, 3, 4, 0, 0), &NoHolidays)
        .unwrap();
    assert_eq!(starts, vec![utc(2025, 3, 2, 23, 0), utc(2025, 3, 3, 0, 0)]);
}

#[test]
fn weekday_without_end_hour_uses_single_start_hour() {
    let policy = RuleBuilder::weekday(2025, &[Weekday::Sat], 10, None)
        .duration(3, DurationUnit::Hour)
        .build();

    assert_eq!(policy.options.by_hour, vec![10]);
    assert_eq!(policy.duration, 3);
}

#[test]
fn weekday_non_positive_year_means_current_year() {
    let policy = RuleBuilder::weekday(0, &[Weekday::Mon], 9, Some(10)).build();
    assert_eq!(policy.options.dt_start.year(), Utc::now().year());
}

// ---------------------------------------------------------------------------
// Specific date
// ---------------------------------------------------------------------------

#[test]
fn specific_date_is_yearly_on_that_date() {
    let policy = RuleBuilder::specific_date(utc(2025, 7, 4, 10, 0)).build();

    assert_eq!(policy.options.frequency, Frequency::Yearly);
    assert_eq!(policy.options.by_month, vec![7]);
    assert_eq!(policy.options.by_month_day, vec![4]);
    assert_eq!(policy.unit, DurationUnit::Day);
}

#[test]
fn begin_local_is_normalized_through_timezone() {
    // 09:00 CEST (UTC+2) is 07:00 UTC.
    let local = NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let policy = RuleBuilder::specific_date(utc(2025, 6, 1, 0, 0))
        .timezone("Europe/Berlin")
        .begin_local(local)
        .build();

    assert_eq!(policy.options.dt_start, utc(2025, 6, 1, 7, 0));
}

// ---------------------------------------------------------------------------
// Nth weekday
// ---------------------------------------------------------------------------

#[test]
fn nth_weekday_uses_ordinal_marker() {
    let policy = RuleBuilder::nth_weekday(2025, Weekday::Tue, 2).build();

    assert_eq!(policy.options.frequency, Frequency::Monthly);
    assert_eq!(
        policy.options.by_weekday,
        vec![WeekdaySpec::nth(2, Weekday::Tue)]
    );
    assert_eq!(policy.options.dt_start, utc(2025, 1, 1, 0, 0));
}

#[test]
fn nth_weekday_aligns_anchor_to_first_hour() {
    // 14:00 in Los Angeles (UTC-8 in winter) is 22:00 UTC.
    let policy = RuleBuilder::nth_weekday(2025, Weekday::Tue, 2)
        .timezone("America/Los_Angeles")
        .hours(14, None)
        .build();

    assert_eq!(policy.options.by_hour, vec![22]);
    assert_eq!(policy.options.dt_start, utc(2025, 1, 1, 22, 0));

    let starts = policy
        .occurrences_between(utc(2025, 2, 1, 0, 0), utc(2025, 2, 28, 0, 0), &NoHolidays)
        .unwrap();
    // Second Tuesday of February 2025 is the 11th.
    assert_eq!(starts, vec![utc(2025, 2, 11, 22, 0)]);
}

#[test]
fn nth_weekday_negative_ordinal_means_last() {
    let policy = RuleBuilder::nth_weekday(2025, Weekday::Fri, -1).build();
    let starts = policy
        .occurrences_between(utc(2025, 1, 1, 0, 0), utc(2025, 2, 1, 0, 0), &NoHolidays)
        .unwrap();

    assert_eq!(starts, vec![utc(2025, 1, 31, 0, 0)]);
}

#[test]
fn month_selectors_restrict_months() {
    let policy = RuleBuilder::nth_weekday(2025, Weekday::Mon, 1)
        .september()
        .january()
        .build();

    assert_eq!(policy.options.by_month, vec![1, 9]);
}

// ---------------------------------------------------------------------------
// Any-time
// ---------------------------------------------------------------------------

#[test]
fn any_time_ignores_join_windows() {
    let policy = RuleBuilder::any_time()
        .join_before(&[10], DurationUnit::Minute, "reminder")
        .deny()
        .build();

    assert!(policy.always_match);
    assert!(policy.join_windows.is_empty());
    assert_eq!(policy.polarity, Polarity::Deny);
}

// ---------------------------------------------------------------------------
// Modifiers and defaults
// ---------------------------------------------------------------------------

#[test]
fn non_positive_duration_and_interval_clamp_to_one() {
    let policy = RuleBuilder::specific_date(utc(2025, 7, 4, 10, 0))
        .duration(0, DurationUnit::Minute)
        .interval(-3)
        .build();

    assert_eq!(policy.duration, 1);
    assert_eq!(policy.unit, DurationUnit::Minute);
    assert_eq!(policy.options.interval, 1);
}

#[test]
fn join_before_appends_windows_with_shared_unit_and_tag() {
    let policy = RuleBuilder::specific_date(utc(2025, 7, 4, 10, 0))
        .join_before(&[60, 15], DurationUnit::Minute, "reminder")
        .build();

    assert_eq!(policy.join_windows.len(), 2);
    assert!(policy
        .join_windows
        .iter()
        .all(|w| w.tag == "reminder" && w.unit == DurationUnit::Minute));
    assert_eq!(policy.join_windows[0].duration, 60);
    assert_eq!(policy.join_windows[1].duration, 15);
}

#[test]
fn exclusions_are_copied_from_dates_and_keys() {
    let shared: HashSet<u32> = [20_251_226].into_iter().collect();
    let policy = RuleBuilder::weekday(2025, &WORKDAYS, 9, Some(17))
        .exclude_dates(&[NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()])
        .exclude_keys(&shared)
        .build();

    assert!(policy.options.exclusions.contains(&20_251_225));
    assert!(policy.options.exclusions.contains(&20_251_226));
    assert_eq!(shared.len(), 1);
}

#[test]
fn unknown_timezone_falls_back_to_utc() {
    let policy = RuleBuilder::weekday(2025, &WORKDAYS, 9, Some(17))
        .timezone("Not/AZone")
        .build();
    assert_eq!(policy.options.by_hour, (9..17).collect::<Vec<u8>>());
}

#[test]
fn build_is_idempotent() {
    let make = || {
        RuleBuilder::weekday(2025, &WORKDAYS, 9, Some(17))
            .timezone("Europe/London")
            .join_before(&[30], DurationUnit::Minute, "open")
            .priority(7)
            .deny()
    };

    let builder = make();
    assert_eq!(builder.build(), builder.build());
    assert_eq!(make().build(), make().build());
}

// ---------------------------------------------------------------------------
// try_build
// ---------------------------------------------------------------------------

#[test]
fn try_build_reports_unknown_timezone() {
    let result = RuleBuilder::weekday(2025, &WORKDAYS, 9, Some(17))
        .timezone("Not/AZone")
        .try_build();
    assert_eq!(
        result,
        Err(PolicyError::InvalidTimezone("Not/AZone".to_string()))
    );
}

#[test]
fn try_build_reports_zero_anchor() {
    let result = RuleBuilder::specific_date(DateTime::UNIX_EPOCH).try_build();
    assert_eq!(result, Err(PolicyError::MissingAnchor));
}

#[test]
fn try_build_matches_build_for_valid_input() {
    let builder = RuleBuilder::month_day(utc(2025, 3, 1, 8, 0), Frequency::Monthly).priority(3);
    assert_eq!(builder.try_build(), Ok(builder.build()));
}

#[test]
fn policy_serializes_to_json_and_back() {
    let policy = RuleBuilder::weekday(2025, &WORKDAYS, 9, Some(17))
        .join_before(&[15], DurationUnit::Minute, "reminder")
        .build();

    let json = serde_json::to_string(&policy).unwrap();
    let back: recurrence_policy::RecurrencePolicy = serde_json::from_str(&json).unwrap();
    assert_eq!(back, policy);
}
