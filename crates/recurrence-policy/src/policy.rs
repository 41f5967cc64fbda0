//! A single rule: calendar options, active duration, join windows, priority
//! and polarity.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expander::{self, add_clamped, sub_clamped};
use crate::holiday::HolidayCalendar;
use crate::options::RecurrenceOptions;

/// Unit for rule durations and join-window lead times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl DurationUnit {
    pub fn span(self, amount: u32) -> Duration {
        let amount = i64::from(amount);
        match self {
            DurationUnit::Second => Duration::seconds(amount),
            DurationUnit::Minute => Duration::minutes(amount),
            DurationUnit::Hour => Duration::hours(amount),
            DurationUnit::Day => Duration::days(amount),
            DurationUnit::Week => Duration::weeks(amount),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinDirection {
    #[default]
    Before,
}

/// A pre-activation notice: active for `duration` before each occurrence starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinWindow {
    #[serde(default)]
    pub direction: JoinDirection,
    pub duration: u32,
    pub unit: DurationUnit,
    /// Opaque routing tag, e.g. "reminder".
    pub tag: String,
}

impl JoinWindow {
    pub fn before(duration: u32, unit: DurationUnit, tag: impl Into<String>) -> Self {
        Self {
            direction: JoinDirection::Before,
            duration,
            unit,
            tag: tag.into(),
        }
    }

    pub fn lead_time(&self) -> Duration {
        self.unit.span(self.duration)
    }
}

/// Whether a matching rule allows or denies the evaluated instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[default]
    Allow,
    Deny,
}

/// One rule in a [`PolicyStack`](crate::PolicyStack).
///
/// Built by [`RuleBuilder`](crate::RuleBuilder) and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePolicy {
    pub options: RecurrenceOptions,
    /// How long the rule stays active from each occurrence start. At least 1.
    pub duration: u32,
    pub unit: DurationUnit,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub join_windows: Vec<JoinWindow>,
    /// Higher wins on conflict.
    pub priority: i32,
    pub polarity: Polarity,
    /// Matches every instant, ignoring the calendar pattern.
    #[serde(default)]
    pub always_match: bool,
}

impl RecurrencePolicy {
    pub fn active_duration(&self) -> Duration {
        self.unit.span(self.duration.max(1))
    }

    /// Check that the options compile into a recurrence set.
    ///
    /// # Errors
    /// Returns `PolicyError::InvalidRule` when the recurrence library rejects them.
    pub fn validate(&self) -> Result<()> {
        if self.always_match {
            return Ok(());
        }
        expander::compile(&self.options).map(|_| ())
    }

    /// Occurrence starts within `[from, to]`. Always-match rules have none.
    ///
    /// # Errors
    /// Returns `PolicyError::InvalidRule` if the options do not compile.
    pub fn occurrences_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        holidays: &dyn HolidayCalendar,
    ) -> Result<Vec<DateTime<Utc>>> {
        if self.always_match {
            return Ok(Vec::new());
        }
        expander::occurrences_between(&self.options, from, to, holidays)
    }

    /// Whether `instant` lies in `[start, start + duration)` for some occurrence.
    ///
    /// # Errors
    /// Returns `PolicyError::InvalidRule` if the options do not compile.
    pub fn matches(&self, instant: DateTime<Utc>, holidays: &dyn HolidayCalendar) -> Result<bool> {
        if self.always_match {
            return Ok(true);
        }
        let active = self.active_duration();
        let starts = self.occurrences_between(sub_clamped(instant, active), instant, holidays)?;
        Ok(starts
            .iter()
            .any(|&start| start <= instant && instant < add_clamped(start, active)))
    }

    /// Join windows open at `instant`, each paired with the occurrence it announces.
    ///
    /// A window is open during `[start - lead, start)`. Each window reports at
    /// most one occurrence, the nearest upcoming one.
    ///
    /// # Errors
    /// Returns `PolicyError::InvalidRule` if the options do not compile.
    pub fn open_join_windows(
        &self,
        instant: DateTime<Utc>,
        holidays: &dyn HolidayCalendar,
    ) -> Result<Vec<(&JoinWindow, DateTime<Utc>)>> {
        if self.always_match || self.join_windows.is_empty() {
            return Ok(Vec::new());
        }
        let Some(max_lead) = self.join_windows.iter().map(JoinWindow::lead_time).max() else {
            return Ok(Vec::new());
        };

        let upcoming =
            self.occurrences_between(instant, add_clamped(instant, max_lead), holidays)?;
        let open = self
            .join_windows
            .iter()
            .filter_map(|window| {
                let lead = window.lead_time();
                upcoming
                    .iter()
                    .find(|&&start| instant < start && sub_clamped(start, lead) <= instant)
                    .map(|&start| (window, start))
            })
            .collect();
        Ok(open)
    }
}
