//! Parcel Registry and shipper directory contracts
//!
//! The parcel catalog and shipper identity systems are external
//! collaborators; this crate defines the read/write contracts CourierCore
//! consumes, an in-memory implementation for fixtures and tests, and a
//! blocking HTTP implementation for deployment.

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod parcel;
pub mod shipper;

pub use client::{ParcelRegistry, ShipperDirectory};
pub use error::RegistryError;
pub use http::HttpRegistryClient;
pub use memory::{InMemoryParcelRegistry, InMemoryShipperDirectory};
pub use parcel::{DeliveryClass, ParcelRecord, ParcelStatusEvent};
pub use shipper::{ShipperProfile, VehicleType};
