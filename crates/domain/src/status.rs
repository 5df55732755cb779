//! Session and assignment status machines
//!
//! Statuses serialize as SCREAMING_SNAKE_CASE both on the wire and in the
//! store. Transition legality lives here as pure predicates; the dispatch
//! crate enforces them inside store transactions.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a delivery session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created with a batch of assignments, not yet started.
    Created,
    /// Shipper is actively working the session.
    InProgress,
    /// Terminal: all work concluded successfully.
    Completed,
    /// Terminal: session aborted or failed.
    Failed,
}

impl SessionStatus {
    /// Terminal statuses are set once and never revisited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Stable storage/wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "CREATED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
        }
    }

    /// Parse a stored label.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "CREATED" => Ok(SessionStatus::Created),
            "IN_PROGRESS" => Ok(SessionStatus::InProgress),
            "COMPLETED" => Ok(SessionStatus::Completed),
            "FAILED" => Ok(SessionStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Lifecycle status of a delivery assignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    /// Created by the orchestrator, waiting for the shipper.
    Pending,
    /// Accepted by the owning shipper (scan recorded).
    Accepted,
    /// Legacy pre-acceptance state; still a legal accept source.
    Assigned,
    /// Session started; delivery underway.
    InProgress,
    /// Terminal: delivered.
    Completed,
    /// Terminal: delivery failed.
    Failed,
}

impl AssignmentStatus {
    /// Terminal statuses are set exactly once.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Failed)
    }

    /// A shipper may accept only from PENDING or ASSIGNED.
    pub fn accept_allowed(&self) -> bool {
        matches!(self, AssignmentStatus::Pending | AssignmentStatus::Assigned)
    }

    /// Stable storage/wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "PENDING",
            AssignmentStatus::Accepted => "ACCEPTED",
            AssignmentStatus::Assigned => "ASSIGNED",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Completed => "COMPLETED",
            AssignmentStatus::Failed => "FAILED",
        }
    }

    /// Parse a stored label.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "PENDING" => Ok(AssignmentStatus::Pending),
            "ACCEPTED" => Ok(AssignmentStatus::Accepted),
            "ASSIGNED" => Ok(AssignmentStatus::Assigned),
            "IN_PROGRESS" => Ok(AssignmentStatus::InProgress),
            "COMPLETED" => Ok(AssignmentStatus::Completed),
            "FAILED" => Ok(AssignmentStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}
