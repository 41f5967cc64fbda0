//! Ordered rule collections and their evaluation.
//!
//! Evaluation walks the stack once. Every matching rule competes on priority;
//! the highest wins and ties go to the rule that appears first. With no match
//! the result is [`Decision::Deny`]. Join-window notices are collected from
//! every rule independently of which rule won.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::holiday::{HolidayCalendar, NoHolidays};
use crate::policy::{Polarity, RecurrencePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl From<Polarity> for Decision {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Allow => Decision::Allow,
            Polarity::Deny => Decision::Deny,
        }
    }
}

/// A join window that is open at the evaluated instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveNotice {
    pub tag: String,
    /// Index of the announcing rule in the stack.
    pub policy_index: usize,
    /// Start of the occurrence being announced.
    pub occurrence_start: DateTime<Utc>,
    pub lead_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    /// Index of the governing rule; `None` when nothing matched.
    pub matched: Option<usize>,
    pub notices: Vec<ActiveNotice>,
}

impl Evaluation {
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// Rules in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyStack {
    policies: Vec<RecurrencePolicy>,
}

impl PolicyStack {
    pub fn new(policies: Vec<RecurrencePolicy>) -> Self {
        Self { policies }
    }

    #[must_use]
    pub fn with(mut self, policy: RecurrencePolicy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn policies(&self) -> &[RecurrencePolicy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecurrencePolicy> {
        self.policies.iter()
    }

    /// Evaluate without a holiday calendar.
    pub fn evaluate(&self, instant: DateTime<Utc>) -> Evaluation {
        self.evaluate_with(instant, &NoHolidays)
    }

    /// Resolve the decision at `instant` and collect open join windows.
    ///
    /// Rules whose options fail to compile never match and announce nothing.
    pub fn evaluate_with(
        &self,
        instant: DateTime<Utc>,
        holidays: &dyn HolidayCalendar,
    ) -> Evaluation {
        let mut winner: Option<(usize, &RecurrencePolicy)> = None;
        let mut notices = Vec::new();

        for (index, policy) in self.policies.iter().enumerate() {
            match policy.matches(instant, holidays) {
                Ok(true) => {
                    let beats = winner.map_or(true, |(_, best)| policy.priority > best.priority);
                    if beats {
                        winner = Some((index, policy));
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping rule that cannot be expanded");
                    continue;
                }
            }

            match policy.open_join_windows(instant, holidays) {
                Ok(open) => notices.extend(open.into_iter().map(|(window, start)| ActiveNotice {
                    tag: window.tag.clone(),
                    policy_index: index,
                    occurrence_start: start,
                    lead_seconds: window.lead_time().num_seconds(),
                })),
                Err(e) => tracing::warn!(index, error = %e, "skipping join windows"),
            }
        }

        let evaluation = match winner {
            Some((index, policy)) => Evaluation {
                decision: policy.polarity.into(),
                matched: Some(index),
                notices,
            },
            None => Evaluation {
                decision: Decision::Deny,
                matched: None,
                notices,
            },
        };

        tracing::debug!(
            %instant,
            decision = ?evaluation.decision,
            matched = ?evaluation.matched,
            notices = evaluation.notices.len(),
            "evaluated policy stack"
        );
        evaluation
    }
}

impl From<Vec<RecurrencePolicy>> for PolicyStack {
    fn from(policies: Vec<RecurrencePolicy>) -> Self {
        Self::new(policies)
    }
}

impl FromIterator<RecurrencePolicy> for PolicyStack {
    fn from_iter<I: IntoIterator<Item = RecurrencePolicy>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PolicyStack {
    type Item = &'a RecurrencePolicy;
    type IntoIter = std::slice::Iter<'a, RecurrencePolicy>;

    fn into_iter(self) -> Self::IntoIter {
        self.policies.iter()
    }
}

/// Evaluate `stack` at `instant`. Same as [`PolicyStack::evaluate`].
pub fn evaluate(stack: &PolicyStack, instant: DateTime<Utc>) -> Evaluation {
    stack.evaluate(instant)
}
