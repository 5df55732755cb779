//! Collaborator contracts
//!
//! Calls are blocking I/O from the caller's perspective. No implementation
//! retries silently; retry policy belongs to the collaborator, not this core.

use crate::error::RegistryError;
use crate::parcel::{ParcelRecord, ParcelStatusEvent};
use crate::shipper::ShipperProfile;
use std::collections::HashMap;

/// Read/write contract against the external parcel catalog.
pub trait ParcelRegistry: Send + Sync {
    /// Fetch one parcel. `Ok(None)` when the registry has no such parcel.
    fn fetch_parcel(&self, id: &str) -> Result<Option<ParcelRecord>, RegistryError>;

    /// Fetch many parcels at once. Ids absent from the returned map simply
    /// do not exist on the registry side; that is not an error here, the
    /// caller decides whether to drop or abort.
    fn fetch_parcels_bulk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ParcelRecord>, RegistryError>;

    /// Request a parcel status transition. Returns the updated record.
    fn change_parcel_status(
        &self,
        id: &str,
        event: ParcelStatusEvent,
    ) -> Result<ParcelRecord, RegistryError>;

    /// All parcels awaiting assignment; backs the auto mode's "all" sentinel.
    fn fetch_unassigned(&self) -> Result<Vec<ParcelRecord>, RegistryError>;
}

/// Read contract against the external shipper identity system.
pub trait ShipperDirectory: Send + Sync {
    /// Capability records for the given shippers. Unknown ids are omitted
    /// from the result rather than failing the call.
    fn fetch_profiles(&self, ids: &[String]) -> Result<Vec<ShipperProfile>, RegistryError>;
}
