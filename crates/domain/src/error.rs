//! Domain errors
//!
//! Pure domain errors with no infrastructure dependencies.

use couriercore_core::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown status value: {0}")]
    UnknownStatus(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Stable classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::UnknownStatus(_) => ErrorKind::Validation,
            DomainError::InvariantViolation(_) => ErrorKind::StateConflict,
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
