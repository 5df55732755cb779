//! Tracking errors

use couriercore_core::ErrorKind;
use couriercore_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the tracking engine.
///
/// Deliberately small: nearest-node lookup failures and sample persistence
/// failures are absorbed inside the engine, not surfaced here.
#[derive(Debug, Error)]
pub enum TrackError {
    /// The session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The session could not be resolved from the store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TrackError {
    /// Stable classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackError::SessionNotFound(_) => ErrorKind::NotFound,
            TrackError::Store(e) => e.kind(),
        }
    }
}
