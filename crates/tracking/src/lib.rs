//! Real-time location tracking engine
//!
//! Ingests one location sample per call, maintains a bounded rolling window
//! per active session, detects first-time road-node passage, and publishes
//! tracking events. The nearest-node lookup is best-effort: its failure
//! degrades detection but never the call.

pub mod engine;
pub mod error;
pub mod window;

use couriercore_domain::{LocationSample, SessionStatus};
use couriercore_store::{DeliveryStore, StoreError};

pub use engine::{TrackOutcome, TrackingConfig, TrackingEngine, TrackingPoint};
pub use error::TrackError;
pub use window::{RollingWindow, WindowCache};

/// Store surface the tracking engine needs.
///
/// Narrow on purpose: session resolution and durable sample history. The
/// engine treats `record_sample` failures as non-fatal, so the in-memory
/// window keeps working when the database is unavailable.
pub trait TrackingStore: Send + Sync {
    /// Status and owning shipper of a session, if it exists.
    fn session_summary(
        &self,
        session_id: &str,
    ) -> Result<Option<(SessionStatus, String)>, StoreError>;

    /// Append one sample to the durable history.
    fn record_sample(&self, sample: &LocationSample) -> Result<(), StoreError>;
}

impl TrackingStore for DeliveryStore {
    fn session_summary(
        &self,
        session_id: &str,
    ) -> Result<Option<(SessionStatus, String)>, StoreError> {
        Ok(self
            .get_session(session_id)?
            .map(|session| (session.status, session.shipper_id)))
    }

    fn record_sample(&self, sample: &LocationSample) -> Result<(), StoreError> {
        self.insert_sample(sample)
    }
}
