//! In-memory registry implementations
//!
//! Fixtures for tests and local development. `fail_status_change_for` lets a
//! test simulate a write-path upstream failure for one parcel.

use crate::client::{ParcelRegistry, ShipperDirectory};
use crate::error::RegistryError;
use crate::parcel::{ParcelRecord, ParcelStatusEvent};
use crate::shipper::ShipperProfile;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory parcel registry.
#[derive(Default)]
pub struct InMemoryParcelRegistry {
    parcels: RwLock<HashMap<String, ParcelRecord>>,
    failing_status_changes: RwLock<HashSet<String>>,
}

impl InMemoryParcelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parcel record.
    pub fn insert(&self, parcel: ParcelRecord) {
        self.parcels
            .write()
            .expect("parcel map poisoned")
            .insert(parcel.id.clone(), parcel);
    }

    /// Make `change_parcel_status` fail for the given parcel id.
    pub fn fail_status_change_for(&self, parcel_id: &str) {
        self.failing_status_changes
            .write()
            .expect("failure set poisoned")
            .insert(parcel_id.to_string());
    }
}

impl ParcelRegistry for InMemoryParcelRegistry {
    fn fetch_parcel(&self, id: &str) -> Result<Option<ParcelRecord>, RegistryError> {
        Ok(self
            .parcels
            .read()
            .expect("parcel map poisoned")
            .get(id)
            .cloned())
    }

    fn fetch_parcels_bulk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ParcelRecord>, RegistryError> {
        let parcels = self.parcels.read().expect("parcel map poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| parcels.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }

    fn change_parcel_status(
        &self,
        id: &str,
        event: ParcelStatusEvent,
    ) -> Result<ParcelRecord, RegistryError> {
        if self
            .failing_status_changes
            .read()
            .expect("failure set poisoned")
            .contains(id)
        {
            return Err(RegistryError::Unavailable(format!(
                "status change rejected for parcel {id}"
            )));
        }

        let mut parcels = self.parcels.write().expect("parcel map poisoned");
        let parcel = parcels.get_mut(id).ok_or_else(|| RegistryError::Remote {
            status: 404,
            message: format!("parcel {id} not found"),
        })?;
        parcel.status = event.as_str().to_string();
        Ok(parcel.clone())
    }

    fn fetch_unassigned(&self) -> Result<Vec<ParcelRecord>, RegistryError> {
        let parcels = self.parcels.read().expect("parcel map poisoned");
        let mut unassigned: Vec<ParcelRecord> = parcels
            .values()
            .filter(|p| p.status == "REGISTERED")
            .cloned()
            .collect();
        unassigned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(unassigned)
    }
}

/// In-memory shipper directory.
#[derive(Default)]
pub struct InMemoryShipperDirectory {
    profiles: RwLock<HashMap<String, ShipperProfile>>,
}

impl InMemoryShipperDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a shipper profile.
    pub fn insert(&self, profile: ShipperProfile) {
        self.profiles
            .write()
            .expect("profile map poisoned")
            .insert(profile.id.clone(), profile);
    }
}

impl ShipperDirectory for InMemoryShipperDirectory {
    fn fetch_profiles(&self, ids: &[String]) -> Result<Vec<ShipperProfile>, RegistryError> {
        let profiles = self.profiles.read().expect("profile map poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| profiles.get(id).cloned())
            .collect())
    }
}
