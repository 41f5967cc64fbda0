//! Error types for recurrence-policy operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Date-anchored rule has no anchor instant")]
    MissingAnchor,
}

pub type Result<T> = std::result::Result<T, PolicyError>;
