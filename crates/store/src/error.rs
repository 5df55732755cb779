//! Store errors

use couriercore_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("assignment not found: {0}")]
    AssignmentNotFound(String),

    #[error("assignment {assignment_id} belongs to shipper {owner}, not {caller}")]
    WrongOwner {
        /// Assignment identifier
        assignment_id: String,
        /// Owning shipper
        owner: String,
        /// Shipper that attempted the operation
        caller: String,
    },

    #[error("illegal transition for {entity} {id}: {from} -> {to}")]
    IllegalTransition {
        /// Aggregate kind ("session" or "assignment")
        entity: &'static str,
        /// Aggregate identifier
        id: String,
        /// Current status label
        from: String,
        /// Requested status label
        to: String,
    },

    #[error("parcel {0} already belongs to an open assignment")]
    ParcelAlreadyAssigned(String),

    #[error("assignment {assignment_id} is not ACCEPTED (status {status})")]
    AssignmentNotAccepted {
        /// Assignment identifier
        assignment_id: String,
        /// Current status label
        status: String,
    },

    #[error("shipper {0} already has a session in progress")]
    ActiveSessionExists(String),

    #[error("assignment {0} already belongs to a session")]
    AssignmentAlreadyBound(String),

    #[error("corrupt stored row: {0}")]
    CorruptRow(String),
}

impl StoreError {
    /// Stable classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Database(_) | StoreError::Io(_) | StoreError::CorruptRow(_) => {
                ErrorKind::Storage
            }
            StoreError::SessionNotFound(_) | StoreError::AssignmentNotFound(_) => {
                ErrorKind::NotFound
            }
            StoreError::WrongOwner { .. }
            | StoreError::IllegalTransition { .. }
            | StoreError::ParcelAlreadyAssigned(_)
            | StoreError::AssignmentNotAccepted { .. }
            | StoreError::ActiveSessionExists(_)
            | StoreError::AssignmentAlreadyBound(_) => ErrorKind::StateConflict,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
