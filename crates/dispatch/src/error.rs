//! Dispatch errors

use couriercore_core::ErrorKind;
use couriercore_geo::GeoError;
use couriercore_registry::RegistryError;
use couriercore_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the lifecycle state machine and the orchestrator.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed or missing input; rejected before any mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced aggregate or parcel does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of the missing thing ("session", "assignment", "parcel")
        entity: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// The aggregate is not in a status that permits the operation.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Parcel registry call failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Route/geometry call failed.
    #[error(transparent)]
    Geometry(#[from] GeoError),

    /// Store operation failed (includes typed state conflicts).
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Stable classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Validation(_) => ErrorKind::Validation,
            DispatchError::NotFound { .. } => ErrorKind::NotFound,
            DispatchError::StateConflict(_) => ErrorKind::StateConflict,
            DispatchError::Registry(e) => e.kind(),
            DispatchError::Geometry(e) => e.kind(),
            DispatchError::Store(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
