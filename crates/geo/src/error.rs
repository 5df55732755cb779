//! Route/geometry client errors

use couriercore_core::ErrorKind;
use thiserror::Error;

/// Failures talking to the routing engine.
#[derive(Debug, Error)]
pub enum GeoError {
    /// HTTP transport failure
    #[error("geometry transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Payload could not be decoded
    #[error("geometry response decode error: {0}")]
    Decode(String),

    /// The solver reported failure or returned no usable result
    #[error("solver failure: {0}")]
    Solver(String),

    /// The collaborator is unavailable (used by non-HTTP implementations)
    #[error("geometry service unavailable: {0}")]
    Unavailable(String),
}

impl GeoError {
    /// Stable classification; all geometry failures are upstream failures.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Upstream
    }
}
