//! Shipper capability records
//!
//! Identity and role management stay external; the orchestrator consumes
//! only this read-side capability view when building solver requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vehicle operated by a shipper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    /// Bicycle
    Bicycle,
    /// Motorbike
    Motorbike,
    /// Car
    Car,
    /// Van
    Van,
    /// Unrecognized vehicle code
    Unknown,
}

impl VehicleType {
    /// Stable wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Bicycle => "BICYCLE",
            VehicleType::Motorbike => "MOTORBIKE",
            VehicleType::Car => "CAR",
            VehicleType::Van => "VAN",
            VehicleType::Unknown => "UNKNOWN",
        }
    }
}

/// Capability record for one shipper, as consumed by the VRP request builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShipperProfile {
    /// Shipper identifier
    pub id: String,
    /// Current latitude
    pub lat: f64,
    /// Current longitude
    pub lon: f64,
    /// Start of the current shift
    pub shift_start: Option<DateTime<Utc>>,
    /// Maximum working-session length in seconds
    pub max_session_s: Option<u64>,
    /// Parcel capacity
    pub capacity: Option<u32>,
    /// Vehicle operated
    pub vehicle: VehicleType,
    /// Serviceable zone identifiers
    pub zones: Vec<String>,
}
