//! # recurrence-policy
//!
//! Stacked allow/deny time rules for business hours, blackout windows,
//! billing-cycle anchors and holiday/weekend fallbacks.
//!
//! Rules are built with [`RuleBuilder`], collected into a [`PolicyStack`] and
//! evaluated at an instant. The highest-priority matching rule decides; open
//! "join windows" (advance notices before a rule becomes active) are reported
//! alongside the decision. Occurrence enumeration is delegated to the `rrule`
//! crate and timezone conversion to `chrono-tz`.
//!
//! ```
//! use chrono::{TimeZone, Utc, Weekday};
//! use recurrence_policy::{Decision, PolicyStack, RuleBuilder};
//!
//! let workdays = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri];
//! let stack = PolicyStack::new(vec![
//!     RuleBuilder::any_time().deny().build(),
//!     RuleBuilder::weekday(2025, &workdays, 9, Some(17)).priority(10).build(),
//! ]);
//!
//! let tuesday_noon = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
//! assert_eq!(stack.evaluate(tuesday_noon).decision, Decision::Allow);
//!
//! let saturday_noon = Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap();
//! assert_eq!(stack.evaluate(saturday_noon).decision, Decision::Deny);
//! ```
//!
//! ## Modules
//!
//! - [`builder`] — fluent rule construction and the specific-date fallback stack
//! - [`stack`] — ordered rule collections and evaluation
//! - [`policy`] — a single rule, its duration and join windows
//! - [`options`] — RFC 5545 calendar constraints
//! - [`expander`] — options → concrete occurrence instants
//! - [`holiday`] — weekend/holiday observance and the holiday calendar seam
//! - [`hours`] — local hour ranges → UTC hour sets
//! - [`nth`] — nth-weekday date arithmetic
//! - [`error`] — Error types

pub mod builder;
pub mod error;
pub mod expander;
pub mod holiday;
pub mod hours;
pub mod nth;
pub mod options;
pub mod policy;
pub mod stack;

pub use builder::{RuleBuilder, RuleKind, DEFAULT_STACK_PRIORITY, WEEKEND_DENY_OFFSET};
pub use error::PolicyError;
pub use holiday::{FixedHolidays, HolidayCalendar, NoHolidays, Observance};
pub use nth::first_nth_weekday;
pub use options::{date_key, Frequency, RecurrenceOptions, WeekdaySpec};
pub use policy::{DurationUnit, JoinDirection, JoinWindow, Polarity, RecurrencePolicy};
pub use stack::{evaluate, ActiveNotice, Decision, Evaluation, PolicyStack};
