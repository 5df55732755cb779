//! Registry client errors

use couriercore_core::ErrorKind;
use thiserror::Error;

/// Failures talking to the parcel registry or shipper directory.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// HTTP transport failure
    #[error("registry transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Payload could not be decoded
    #[error("registry response decode error: {0}")]
    Decode(String),

    /// The remote rejected the request
    #[error("registry rejected request ({status}): {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Remote error message
        message: String,
    },

    /// The collaborator is unavailable (used by non-HTTP implementations)
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    /// Stable classification; all registry failures are upstream failures.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Upstream
    }
}
