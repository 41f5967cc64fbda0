//! Fluent construction of [`RecurrencePolicy`] values.
//!
//! Each constructor picks a [`RuleKind`] and seeds defaults; chainable
//! modifiers adjust the shared settings; [`RuleBuilder::build`] resolves the
//! kind into concrete [`RecurrenceOptions`].
//!
//! Modifiers never fail. Out-of-range input is clamped to a safe default
//! (duration and interval to 1, year to the current year, unknown timezone
//! names to UTC) and logged. [`RuleBuilder::try_build`] reports the problems
//! instead.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use recurrence_policy::{DurationUnit, Frequency, RuleBuilder};
//!
//! let christmas = Utc.with_ymd_and_hms(2025, 12, 25, 0, 0, 0).unwrap();
//! let policy = RuleBuilder::month_day(christmas, Frequency::Yearly)
//!     .duration(1, DurationUnit::Day)
//!     .deny()
//!     .priority(50)
//!     .build();
//!
//! assert_eq!(policy.options.by_month, vec![12]);
//! assert_eq!(policy.options.by_month_day, vec![25]);
//! ```

use std::collections::BTreeSet;

use chrono::{
    DateTime, Datelike, Duration, Month, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

use crate::error::{PolicyError, Result};
use crate::holiday::{is_weekend, Observance};
use crate::hours;
use crate::options::{date_key, Frequency, RecurrenceOptions, WeekdaySpec};
use crate::policy::{DurationUnit, JoinWindow, Polarity, RecurrencePolicy};

/// Priority of the base rule in a specific-date stack when none was set.
pub const DEFAULT_STACK_PRIORITY: i32 = 10;

/// Added to the base priority for the generated weekend-deny rule.
pub const WEEKEND_DENY_OFFSET: i32 = 90;

/// The five rule shapes, each carrying only what it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// The anchor's month and day of month. Monthly rules only recur every
    /// month after [`RuleBuilder::every_month`].
    MonthDay {
        anchor: DateTime<Utc>,
        frequency: Frequency,
    },
    /// Matches every instant.
    AnyTime,
    /// Listed weekdays of `year` onwards.
    Weekday { year: i32, weekdays: Vec<Weekday> },
    /// One calendar date, recurring yearly.
    SpecificDate { date: DateTime<Utc> },
    /// The `nth` `weekday` of every month; negative counts from the end.
    NthWeekday { year: i32, weekday: Weekday, nth: i16 },
}

#[derive(Debug, Clone)]
pub struct RuleBuilder {
    kind: RuleKind,
    timezone: Tz,
    invalid_timezone: Option<String>,
    begin_time: Option<DateTime<Utc>>,
    /// Local start hour and optional end hour.
    hours: Option<(u8, Option<u8>)>,
    duration: u32,
    unit: Option<DurationUnit>,
    join_windows: Vec<JoinWindow>,
    priority: Option<i32>,
    polarity: Polarity,
    interval: u16,
    count: Option<u32>,
    until: Option<DateTime<Utc>>,
    weekdays: Vec<Weekday>,
    months: Vec<u8>,
    all_months: bool,
    by_year_day: Vec<i16>,
    by_week_no: Vec<i8>,
    by_set_pos: Vec<i32>,
    by_easter: Option<i16>,
    shift_weekends: bool,
    shift_holidays: bool,
    observance: Observance,
    iso_code: Option<String>,
    exclusions: BTreeSet<u32>,
    shift_to: Option<Weekday>,
    max_fallback_days: u32,
}

fn current_year() -> i32 {
    Utc::now().year()
}

fn resolve_year(year: i32) -> i32 {
    if year > 0 {
        year
    } else {
        let fallback = current_year();
        tracing::warn!(year, fallback, "non-positive year, using current year");
        fallback
    }
}

fn start_of_year(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn at_utc_hour(date: NaiveDate, hour: u8) -> Option<DateTime<Utc>> {
    date.and_hms_opt(u32::from(hour), 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Days forward from `from` to the next `target`; a full week when they match.
fn days_until(from: Weekday, target: Weekday) -> u32 {
    let offset = (target.num_days_from_monday() + 7 - from.num_days_from_monday()) % 7;
    if offset == 0 {
        7
    } else {
        offset
    }
}

impl RuleBuilder {
    fn with_kind(kind: RuleKind) -> Self {
        Self {
            kind,
            timezone: Tz::UTC,
            invalid_timezone: None,
            begin_time: None,
            hours: None,
            duration: 1,
            unit: None,
            join_windows: Vec::new(),
            priority: None,
            polarity: Polarity::Allow,
            interval: 1,
            count: None,
            until: None,
            weekdays: Vec::new(),
            months: Vec::new(),
            all_months: false,
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_set_pos: Vec::new(),
            by_easter: None,
            shift_weekends: false,
            shift_holidays: false,
            observance: Observance::None,
            iso_code: None,
            exclusions: BTreeSet::new(),
            shift_to: None,
            max_fallback_days: 0,
        }
    }

    /// A rule on the anchor's month and day of month. Frequencies other than
    /// yearly and monthly are coerced to monthly.
    pub fn month_day(anchor: DateTime<Utc>, frequency: Frequency) -> Self {
        let frequency = match frequency {
            Frequency::Yearly => Frequency::Yearly,
            _ => Frequency::Monthly,
        };
        Self::with_kind(RuleKind::MonthDay { anchor, frequency })
    }

    pub fn any_time() -> Self {
        Self::with_kind(RuleKind::AnyTime)
    }

    /// Listed weekdays between `start_hour` and `end_hour` (local time).
    ///
    /// Without an end hour only `start_hour` is used and the caller bounds the
    /// window with [`duration`](Self::duration).
    pub fn weekday(year: i32, weekdays: &[Weekday], start_hour: u8, end_hour: Option<u8>) -> Self {
        let mut builder = Self::with_kind(RuleKind::Weekday {
            year: resolve_year(year),
            weekdays: weekdays.to_vec(),
        });
        builder.hours = Some((start_hour, end_hour));
        builder
    }

    pub fn specific_date(date: DateTime<Utc>) -> Self {
        Self::with_kind(RuleKind::SpecificDate { date })
    }

    /// The `nth` `weekday` of each month, e.g. `(2, Tue)` or `(-1, Fri)` for
    /// the last Friday. A zero ordinal becomes 1.
    pub fn nth_weekday(year: i32, weekday: Weekday, nth: i16) -> Self {
        let nth = if nth == 0 {
            tracing::warn!("zero weekday ordinal, using 1");
            1
        } else {
            nth
        };
        Self::with_kind(RuleKind::NthWeekday {
            year: resolve_year(year),
            weekday,
            nth,
        })
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    #[must_use]
    pub fn duration(mut self, amount: i64, unit: DurationUnit) -> Self {
        self.duration = if amount <= 0 {
            tracing::warn!(amount, "non-positive duration, using 1");
            1
        } else {
            u32::try_from(amount).unwrap_or(u32::MAX)
        };
        self.unit = Some(unit);
        self
    }

    /// Append one "before" join window per lead time, sharing `unit` and `tag`.
    #[must_use]
    pub fn join_before(mut self, leads: &[u32], unit: DurationUnit, tag: &str) -> Self {
        self.join_windows
            .extend(leads.iter().map(|&lead| JoinWindow::before(lead, unit, tag)));
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    #[must_use]
    pub fn allow(self) -> Self {
        self.polarity(Polarity::Allow)
    }

    #[must_use]
    pub fn deny(self) -> Self {
        self.polarity(Polarity::Deny)
    }

    #[must_use]
    pub fn interval(mut self, interval: i64) -> Self {
        self.interval = if interval <= 0 {
            tracing::warn!(interval, "non-positive interval, using 1");
            1
        } else {
            u16::try_from(interval).unwrap_or(u16::MAX)
        };
        self
    }

    #[must_use]
    pub fn count(mut self, count: u32) -> Self {
        self.count = (count > 0).then_some(count);
        self
    }

    #[must_use]
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn shift_weekends(mut self, shift: bool) -> Self {
        self.shift_weekends = shift;
        self
    }

    #[must_use]
    pub fn shift_holidays(mut self, shift: bool) -> Self {
        self.shift_holidays = shift;
        self
    }

    #[must_use]
    pub fn observance(mut self, observance: Observance) -> Self {
        self.observance = observance;
        self
    }

    #[must_use]
    pub fn iso_code(mut self, code: &str) -> Self {
        self.iso_code = Some(code.to_uppercase());
        self
    }

    /// IANA timezone used for local hours and local begin times.
    /// Unknown names fall back to UTC.
    #[must_use]
    pub fn timezone(mut self, name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => {
                self.timezone = tz;
                self.invalid_timezone = None;
            }
            Err(_) => {
                tracing::warn!(timezone = name, "unknown timezone, using UTC");
                self.timezone = Tz::UTC;
                self.invalid_timezone = Some(name.to_string());
            }
        }
        self
    }

    /// Explicit anchor instant.
    #[must_use]
    pub fn begin_time<T: TimeZone>(mut self, begin: DateTime<T>) -> Self {
        self.begin_time = Some(begin.with_timezone(&Utc));
        self
    }

    /// Anchor given as wall-clock time in the configured timezone.
    #[must_use]
    pub fn begin_local(mut self, local: NaiveDateTime) -> Self {
        let begin = self
            .timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local));
        self.begin_time = Some(begin);
        self
    }

    /// Local hour range. See [`hours::utc_hour_set`] for the UTC conversion.
    #[must_use]
    pub fn hours(mut self, start_hour: u8, end_hour: Option<u8>) -> Self {
        self.hours = Some((start_hour % 24, end_hour.map(|h| h % 24)));
        self
    }

    #[must_use]
    pub fn on_weekdays(mut self, weekdays: &[Weekday]) -> Self {
        for &weekday in weekdays {
            if !self.weekdays.contains(&weekday) {
                self.weekdays.push(weekday);
            }
        }
        self
    }

    #[must_use]
    pub fn exclude_dates(mut self, dates: &[NaiveDate]) -> Self {
        self.exclusions.extend(dates.iter().copied().map(date_key));
        self
    }

    /// Exclude dates given as `year * 10000 + month * 100 + day` keys.
    /// The keys are copied; the caller keeps ownership of its set.
    #[must_use]
    pub fn exclude_keys<'a>(mut self, keys: impl IntoIterator<Item = &'a u32>) -> Self {
        self.exclusions.extend(keys);
        self
    }

    /// Move the weekend fallback straight to the next `weekday`.
    #[must_use]
    pub fn shift_to(mut self, weekday: Weekday) -> Self {
        self.shift_to = Some(weekday);
        self
    }

    #[must_use]
    pub fn max_fallback_days(mut self, days: u32) -> Self {
        self.max_fallback_days = days;
        self
    }

    #[must_use]
    pub fn by_year_day(mut self, days: Vec<i16>) -> Self {
        self.by_year_day = days;
        self
    }

    #[must_use]
    pub fn by_week_number(mut self, weeks: Vec<i8>) -> Self {
        self.by_week_no = weeks;
        self
    }

    #[must_use]
    pub fn by_set_position(mut self, positions: Vec<i32>) -> Self {
        self.by_set_pos = positions;
        self
    }

    /// Offset in days from Easter Sunday.
    #[must_use]
    pub fn by_easter(mut self, offset: i16) -> Self {
        self.by_easter = Some(offset);
        self
    }

    #[must_use]
    pub fn in_month(mut self, month: Month) -> Self {
        let number = month.number_from_month() as u8;
        if !self.months.contains(&number) {
            self.months.push(number);
        }
        self
    }

    /// Drop the derived month so a month-day rule fires on its day of every
    /// month. Explicit month selectors still apply.
    #[must_use]
    pub fn every_month(mut self) -> Self {
        self.all_months = true;
        self
    }

    fn frequency_and_anchor(&self) -> (Frequency, DateTime<Utc>) {
        match &self.kind {
            RuleKind::MonthDay { anchor, frequency } => (*frequency, *anchor),
            RuleKind::AnyTime => (Frequency::Daily, DateTime::UNIX_EPOCH),
            RuleKind::Weekday { year, .. } => (Frequency::Weekly, start_of_year(*year)),
            RuleKind::SpecificDate { date } => (Frequency::Yearly, *date),
            RuleKind::NthWeekday { year, .. } => (Frequency::Monthly, start_of_year(*year)),
        }
    }

    fn is_date_anchored(&self) -> bool {
        matches!(
            self.kind,
            RuleKind::MonthDay { .. } | RuleKind::SpecificDate { .. }
        )
    }

    /// The begin time, or the kind's own date; `None` when it is the zero instant.
    fn anchor_instant(&self) -> Option<DateTime<Utc>> {
        let anchor = match (&self.kind, self.begin_time) {
            (_, Some(begin)) => begin,
            (RuleKind::MonthDay { anchor, .. }, None) => *anchor,
            (RuleKind::SpecificDate { date }, None) => *date,
            _ => return None,
        };
        (anchor != DateTime::UNIX_EPOCH).then_some(anchor)
    }

    /// Local date the hour range is converted on.
    fn reference_date(&self) -> NaiveDate {
        if let Some(begin) = self.begin_time {
            return begin.with_timezone(&self.timezone).date_naive();
        }
        let year = match &self.kind {
            RuleKind::MonthDay { anchor, .. } => {
                return anchor.with_timezone(&self.timezone).date_naive()
            }
            RuleKind::SpecificDate { date } => {
                return date.with_timezone(&self.timezone).date_naive()
            }
            RuleKind::Weekday { year, .. } | RuleKind::NthWeekday { year, .. } => *year,
            RuleKind::AnyTime => Utc::now().with_timezone(&self.timezone).year(),
        };
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default()
    }

    fn default_unit(&self) -> DurationUnit {
        match (&self.kind, self.hours) {
            (RuleKind::AnyTime, _) => DurationUnit::Day,
            (RuleKind::Weekday { .. }, _) | (_, Some(_)) => DurationUnit::Hour,
            _ => DurationUnit::Day,
        }
    }

    /// Resolve the builder into a policy. Idempotent.
    pub fn build(&self) -> RecurrencePolicy {
        let (frequency, anchor) = self.frequency_and_anchor();
        let mut options = RecurrenceOptions::new(frequency, self.begin_time.unwrap_or(anchor));
        let mut always_match = false;

        match &self.kind {
            RuleKind::MonthDay { anchor, .. } => {
                options.by_month_day = vec![anchor.day() as i8];
                if !self.all_months {
                    options.by_month = vec![anchor.month() as u8];
                }
            }
            RuleKind::AnyTime => always_match = true,
            RuleKind::Weekday { weekdays, .. } => {
                options.by_weekday = weekdays.iter().copied().map(WeekdaySpec::every).collect();
            }
            RuleKind::SpecificDate { date } => {
                options.by_month = vec![date.month() as u8];
                options.by_month_day = vec![date.day() as i8];
            }
            RuleKind::NthWeekday { weekday, nth, .. } => {
                options.by_weekday = vec![WeekdaySpec::nth(*nth, *weekday)];
            }
        }

        for &weekday in &self.weekdays {
            let spec = WeekdaySpec::every(weekday);
            if !options.by_weekday.contains(&spec) {
                options.by_weekday.push(spec);
            }
        }

        if let Some((start, end)) = self.hours.filter(|_| !always_match) {
            let reference = self.reference_date();
            let utc = hours::utc_hour_set(self.timezone, reference, start, end);
            options.by_hour = utc.hours;

            // Weekdays name local days; hours landing on another UTC day
            // carry that offset so the window stays on its local weekday.
            if !options.by_weekday.is_empty() && options.by_weekday.iter().all(|w| w.nth.is_none()) {
                for (hour, offset) in hours::utc_day_offsets(self.timezone, reference, start, end) {
                    if !options.by_hour.contains(&hour) {
                        continue;
                    }
                    match offset {
                        1 => options.next_day_hours.push(hour),
                        -1 => options.previous_day_hours.push(hour),
                        _ => {}
                    }
                }
                options.next_day_hours.sort_unstable();
                options.previous_day_hours.sort_unstable();
            }

            let aligned = match (&self.kind, self.begin_time) {
                (_, None) => at_utc_hour(reference, utc.start),
                (RuleKind::NthWeekday { .. }, Some(begin)) => {
                    at_utc_hour(begin.date_naive(), utc.start)
                }
                _ => None,
            };
            if let Some(dt_start) = aligned {
                options.dt_start = dt_start;
            }
        }

        options.interval = self.interval;
        options.count = self.count;
        options.until = self.until;
        if !self.months.is_empty() {
            options.by_month = self.months.clone();
            options.by_month.sort_unstable();
        }
        options.by_year_day = self.by_year_day.clone();
        options.by_week_no = self.by_week_no.clone();
        options.by_set_pos = self.by_set_pos.clone();
        options.by_easter = self.by_easter;
        options.shift_weekends = self.shift_weekends;
        options.shift_holidays = self.shift_holidays;
        options.observance = self.observance;
        options.iso_code = self.iso_code.clone();
        options.exclusions = self.exclusions.clone();

        let policy = RecurrencePolicy {
            options,
            duration: self.duration,
            unit: self.unit.unwrap_or_else(|| self.default_unit()),
            join_windows: if always_match {
                Vec::new()
            } else {
                self.join_windows.clone()
            },
            priority: self.priority.unwrap_or(0),
            polarity: self.polarity,
            always_match,
        };

        tracing::debug!(
            kind = ?self.kind,
            priority = policy.priority,
            polarity = ?policy.polarity,
            dt_start = %policy.options.dt_start,
            "built recurrence policy"
        );
        policy
    }

    /// Like [`build`](Self::build), but reports input that `build` would
    /// silently replace.
    ///
    /// # Errors
    /// - `PolicyError::InvalidTimezone` if [`timezone`](Self::timezone) got an unknown name.
    /// - `PolicyError::MissingAnchor` for a date-anchored kind with a zero anchor.
    /// - `PolicyError::InvalidRule` if the recurrence library rejects the options.
    pub fn try_build(&self) -> Result<RecurrencePolicy> {
        if let Some(name) = &self.invalid_timezone {
            return Err(PolicyError::InvalidTimezone(name.clone()));
        }
        if self.is_date_anchored() && self.anchor_instant().is_none() {
            return Err(PolicyError::MissingAnchor);
        }
        let policy = self.build();
        policy.validate()?;
        Ok(policy)
    }

    fn specific_date_rule(&self, date: DateTime<Utc>, priority: i32) -> RecurrencePolicy {
        let mut builder = self.clone();
        builder.kind = RuleKind::SpecificDate { date };
        builder.begin_time = None;
        builder.priority = Some(priority);
        builder.polarity = Polarity::Allow;
        builder.shift_to = None;
        builder.max_fallback_days = 0;
        builder.weekdays.clear();
        builder.months.clear();
        builder.all_months = false;
        builder.by_year_day.clear();
        builder.by_week_no.clear();
        builder.by_set_pos.clear();
        builder.by_easter = None;
        builder.build()
    }

    /// The single alternate allow rule for a base date that lands on a weekend.
    ///
    /// With a [`shift_to`](Self::shift_to) target the next such weekday is the
    /// only candidate. Otherwise days `base+1 ..= base+lookahead_days` are
    /// walked and the first one that is neither a weekend day nor excluded is
    /// taken. The rule's priority is `base_priority + (lookahead_days - step)`,
    /// so nearer candidates rank higher.
    pub fn weekend_fallback(
        &self,
        base: DateTime<Utc>,
        base_priority: i32,
        lookahead_days: u32,
    ) -> Option<RecurrencePolicy> {
        let lookahead = i32::try_from(lookahead_days).unwrap_or(i32::MAX);
        let priority_at = |step: u32| {
            base_priority
                .saturating_add(lookahead)
                .saturating_sub(i32::try_from(step).unwrap_or(i32::MAX))
        };

        if let Some(target) = self.shift_to {
            let step = days_until(base.weekday(), target);
            let candidate = base.checked_add_signed(Duration::days(i64::from(step)))?;
            tracing::debug!(%candidate, step, "weekend fallback shifted to target weekday");
            return Some(self.specific_date_rule(candidate, priority_at(step)));
        }

        (1..=lookahead_days)
            .map_while(|step| {
                base.checked_add_signed(Duration::days(i64::from(step)))
                    .map(|candidate| (step, candidate))
            })
            .find_map(|(step, candidate)| {
                let date = candidate.date_naive();
                if is_weekend(date) || self.exclusions.contains(&date_key(date)) {
                    return None;
                }
                tracing::debug!(%candidate, step, "weekend fallback candidate accepted");
                Some(self.specific_date_rule(candidate, priority_at(step)))
            })
    }

    /// Layered rules for a single anchored date: `[base, weekend-deny?, fallback?]`.
    ///
    /// - The base allow rule uses the configured priority (default
    ///   [`DEFAULT_STACK_PRIORITY`]).
    /// - A base date on Saturday or Sunday adds a deny rule over every weekend
    ///   day of that calendar year at `priority + WEEKEND_DENY_OFFSET`.
    /// - With a positive [`max_fallback_days`](Self::max_fallback_days) a
    ///   weekend base date also gets the rule from [`weekend_fallback`](Self::weekend_fallback).
    ///
    /// Returns an empty list when there is no non-zero anchor.
    pub fn build_specific_date_stack(&self) -> Vec<RecurrencePolicy> {
        let Some(base) = self.anchor_instant() else {
            tracing::debug!("specific-date stack requested without an anchor");
            return Vec::new();
        };
        let priority = self.priority.unwrap_or(DEFAULT_STACK_PRIORITY);

        let mut rules = vec![self.specific_date_rule(base, priority)];

        if !is_weekend(base.date_naive()) {
            return rules;
        }

        let year = base.year();
        let year_end = Utc
            .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or(base);
        rules.push(
            RuleBuilder::weekday(year, &[Weekday::Sat, Weekday::Sun], 0, None)
                .duration(1, DurationUnit::Day)
                .until(year_end)
                .priority(priority.saturating_add(WEEKEND_DENY_OFFSET))
                .deny()
                .build(),
        );

        if self.max_fallback_days > 0 {
            if let Some(fallback) = self.weekend_fallback(base, priority, self.max_fallback_days) {
                rules.push(fallback);
            }
        }

        rules
    }
}

macro_rules! month_selectors {
    ($($name:ident => $month:ident),* $(,)?) => {
        impl RuleBuilder {
            $(
                #[must_use]
                pub fn $name(self) -> Self {
                    self.in_month(Month::$month)
                }
            )*
        }
    };
}

month_selectors! {
    january => January,
    february => February,
    march => March,
    april => April,
    may => May,
    june => June,
    july => July,
    august => August,
    september => September,
    october => October,
    november => November,
    december => December,
}
