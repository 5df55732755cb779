//! Parcel records and status events
//!
//! Delivery classes arrive from the registry as free-form codes; they are
//! mapped into a closed enumeration with an explicit `Unknown` case so a
//! mapping miss is recorded instead of silently defaulting.

use serde::{Deserialize, Serialize};

/// Default routing priority for parcels whose class is not recognized.
pub const DEFAULT_ROUTE_PRIORITY: u32 = 3;

/// Parcel delivery class, ordered by urgency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryClass {
    /// Most urgent; delivered ahead of everything else
    Express,
    /// Same-day delivery
    SameDay,
    /// Standard delivery
    Standard,
    /// Lowest urgency
    Economy,
    /// Unrecognized class code from the registry
    Unknown,
}

impl DeliveryClass {
    /// Parse a registry class code. Unrecognized codes map to `Unknown`;
    /// callers that route on priority must log the miss.
    pub fn from_code(code: &str) -> Self {
        match code {
            "EXPRESS" => DeliveryClass::Express,
            "SAME_DAY" => DeliveryClass::SameDay,
            "STANDARD" => DeliveryClass::Standard,
            "ECONOMY" => DeliveryClass::Economy,
            _ => DeliveryClass::Unknown,
        }
    }

    /// Routing priority: most-urgent class maps to the lowest number.
    /// `Unknown` takes [`DEFAULT_ROUTE_PRIORITY`].
    pub fn route_priority(&self) -> u32 {
        match self {
            DeliveryClass::Express => 1,
            DeliveryClass::SameDay => 2,
            DeliveryClass::Standard => 3,
            DeliveryClass::Economy => 4,
            DeliveryClass::Unknown => DEFAULT_ROUTE_PRIORITY,
        }
    }
}

/// Parcel details as served by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParcelRecord {
    /// External parcel identifier
    pub id: String,
    /// Delivery address identifier
    pub receiver_address_id: String,
    /// Delivery latitude, when geocoded
    pub lat: Option<f64>,
    /// Delivery longitude, when geocoded
    pub lon: Option<f64>,
    /// Delivery class
    pub delivery_class: DeliveryClass,
    /// Registry-side parcel status label (opaque to this core)
    pub status: String,
}

impl ParcelRecord {
    /// Coordinates when the parcel has been geocoded.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Status transition requested of the parcel registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParcelStatusEvent {
    /// Parcel picked up and on route (session start)
    PickedUp,
    /// Parcel delivered (task completion)
    Delivered,
    /// Delivery attempt failed (task failure)
    DeliveryFailed,
}

impl ParcelStatusEvent {
    /// Stable wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatusEvent::PickedUp => "PICKED_UP",
            ParcelStatusEvent::Delivered => "DELIVERED",
            ParcelStatusEvent::DeliveryFailed => "DELIVERY_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_maps_to_lowest_priority() {
        assert_eq!(DeliveryClass::Express.route_priority(), 1);
        assert!(DeliveryClass::Express.route_priority() < DeliveryClass::SameDay.route_priority());
        assert!(DeliveryClass::SameDay.route_priority() < DeliveryClass::Economy.route_priority());
    }

    #[test]
    fn unknown_class_takes_default_priority() {
        let class = DeliveryClass::from_code("CARRIER_PIGEON");
        assert_eq!(class, DeliveryClass::Unknown);
        assert_eq!(class.route_priority(), DEFAULT_ROUTE_PRIORITY);
    }

    #[test]
    fn coordinates_require_both_axes() {
        let mut parcel = ParcelRecord {
            id: "p-1".to_string(),
            receiver_address_id: "addr-1".to_string(),
            lat: Some(52.0),
            lon: None,
            delivery_class: DeliveryClass::Standard,
            status: "REGISTERED".to_string(),
        };
        assert!(parcel.coordinates().is_none());

        parcel.lon = Some(13.0);
        assert_eq!(parcel.coordinates(), Some((52.0, 13.0)));
    }
}
