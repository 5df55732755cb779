//! Shared error classification
//!
//! Every crate in the workspace defines its own `thiserror` enum; each of
//! those enums exposes a `kind()` that maps the concrete failure into this
//! stable classification so callers (and the HTTP layer) can act on the
//! category without matching on crate-specific variants.

use serde::{Deserialize, Serialize};

/// Stable error category carried by every CourierCore error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or missing input; rejected before any mutation.
    Validation,
    /// Session, assignment, or parcel absent; no mutation performed.
    NotFound,
    /// Illegal transition, wrong owner, or concurrent-update loser.
    StateConflict,
    /// A collaborator call (parcel registry, route geometry) failed or
    /// returned an unusable result.
    Upstream,
    /// The persistent store failed.
    Storage,
}

impl ErrorKind {
    /// Stable wire label for the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::StateConflict => "STATE_CONFLICT",
            ErrorKind::Upstream => "UPSTREAM",
            ErrorKind::Storage => "STORAGE",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ErrorKind::Validation.as_str(), "VALIDATION");
        assert_eq!(ErrorKind::StateConflict.as_str(), "STATE_CONFLICT");
        assert_eq!(ErrorKind::Upstream.to_string(), "UPSTREAM");
    }
}
