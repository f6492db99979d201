//! The module contains the error the engine can throw.
//!
//! The kinds mirror what callers need to react to:
//!
//! - [`MissingField`] a required input is absent.
//! - [`InvalidFormat`] a decimal, date or cron expression cannot be parsed.
//! - [`BusinessRule`] the validator rejected the transaction shape.
//! - [`NotFound`] a referenced row does not exist.
//! - [`InvariantViolation`] derived data would be unbalanced.
//!
//!  [`MissingField`]: EngineError::MissingField
//!  [`InvalidFormat`]: EngineError::InvalidFormat
//!  [`BusinessRule`]: EngineError::BusinessRule
//!  [`NotFound`]: EngineError::NotFound
//!  [`InvariantViolation`]: EngineError::InvariantViolation
use std::fmt::Display;

use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("{0}")]
    BusinessRule(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Wrap storage failures with the name of the operation that hit them.
    ///
    /// Domain errors pass through untouched so callers can still match on them.
    pub(crate) fn context(self, operation: impl Display) -> Self {
        match self {
            Self::Database(err) => Self::Internal(format!("{operation}: {err}")),
            Self::Internal(msg) => Self::Internal(format!("{operation}: {msg}")),
            other => other,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(format!("json: {value}"))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::MissingField(a), Self::MissingField(b)) => a == b,
            (Self::InvalidFormat(a), Self::InvalidFormat(b)) => a == b,
            (Self::BusinessRule(a), Self::BusinessRule(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::InvariantViolation(a), Self::InvariantViolation(b)) => a == b,
            (Self::Script(a), Self::Script(b)) => a == b,
            (Self::Cancelled, Self::Cancelled) => true,
            (Self::Internal(a), Self::Internal(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
