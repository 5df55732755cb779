//! Blocking HTTP registry client

use crate::client::{ParcelRegistry, ShipperDirectory};
use crate::error::RegistryError;
use crate::parcel::{ParcelRecord, ParcelStatusEvent};
use crate::shipper::ShipperProfile;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// HTTP client against the parcel registry and shipper directory services.
pub struct HttpRegistryClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct StatusChangeBody {
    event: ParcelStatusEvent,
}

#[derive(Serialize)]
struct BulkFetchBody<'a> {
    ids: &'a [String],
}

impl HttpRegistryClient {
    /// Create a client for the registry at `base_url` with a request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl ParcelRegistry for HttpRegistryClient {
    fn fetch_parcel(&self, id: &str) -> Result<Option<ParcelRecord>, RegistryError> {
        let response = self.client.get(self.url(&format!("/parcels/{id}"))).send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RegistryError::Remote {
                status: response.status().as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
        let parcel = response
            .json::<ParcelRecord>()
            .map_err(|e| RegistryError::Decode(e.to_string()))?;
        Ok(Some(parcel))
    }

    fn fetch_parcels_bulk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ParcelRecord>, RegistryError> {
        let response = self
            .client
            .post(self.url("/parcels/bulk"))
            .json(&BulkFetchBody { ids })
            .send()?;
        if !response.status().is_success() {
            return Err(RegistryError::Remote {
                status: response.status().as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
        response
            .json::<HashMap<String, ParcelRecord>>()
            .map_err(|e| RegistryError::Decode(e.to_string()))
    }

    fn change_parcel_status(
        &self,
        id: &str,
        event: ParcelStatusEvent,
    ) -> Result<ParcelRecord, RegistryError> {
        let response = self
            .client
            .post(self.url(&format!("/parcels/{id}/status")))
            .json(&StatusChangeBody { event })
            .send()?;
        if !response.status().is_success() {
            return Err(RegistryError::Remote {
                status: response.status().as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
        response
            .json::<ParcelRecord>()
            .map_err(|e| RegistryError::Decode(e.to_string()))
    }

    fn fetch_unassigned(&self) -> Result<Vec<ParcelRecord>, RegistryError> {
        let response = self.client.get(self.url("/parcels/unassigned")).send()?;
        if !response.status().is_success() {
            return Err(RegistryError::Remote {
                status: response.status().as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
        response
            .json::<Vec<ParcelRecord>>()
            .map_err(|e| RegistryError::Decode(e.to_string()))
    }
}

impl ShipperDirectory for HttpRegistryClient {
    fn fetch_profiles(&self, ids: &[String]) -> Result<Vec<ShipperProfile>, RegistryError> {
        let response = self
            .client
            .post(self.url("/shippers/profiles"))
            .json(&BulkFetchBody { ids })
            .send()?;
        if !response.status().is_success() {
            return Err(RegistryError::Remote {
                status: response.status().as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
        response
            .json::<Vec<ShipperProfile>>()
            .map_err(|e| RegistryError::Decode(e.to_string()))
    }
}
