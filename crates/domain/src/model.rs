//! Domain aggregates
//!
//! One continuous working period for a shipper is a [`DeliverySession`]; one
//! unit of work (deliver a set of parcels sharing a delivery address) is a
//! [`DeliveryAssignment`]. Location samples are durable history plus a
//! bounded in-memory window owned by the tracking crate.

use crate::status::{AssignmentStatus, SessionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
}

/// One continuous working period for one shipper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliverySession {
    /// Session identifier
    pub id: String,
    /// Owning shipper
    pub shipper_id: String,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Set when the session transitions to IN_PROGRESS
    pub started_at: Option<DateTime<Utc>>,
    /// Set once when the session reaches a terminal status
    pub ended_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Assignments in working order
    pub assignments: Vec<DeliveryAssignment>,
}

impl DeliverySession {
    /// Create a fresh session in CREATED with no assignments bound yet.
    pub fn new(shipper_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            shipper_id: shipper_id.into(),
            status: SessionStatus::Created,
            started_at: None,
            ended_at: None,
            created_at,
            assignments: Vec::new(),
        }
    }

    /// A session accepts tracking samples only while IN_PROGRESS.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::InProgress
    }
}

/// A unit of work: deliver a set of parcels that share one delivery address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryAssignment {
    /// Assignment identifier
    pub id: String,
    /// Owning shipper
    pub shipper_id: String,
    /// The single delivery address all linked parcels share
    pub delivery_address_id: String,
    /// Lifecycle status
    pub status: AssignmentStatus,
    /// Owning session, bound at session creation
    pub session_id: Option<String>,
    /// When the orchestrator created the assignment
    pub assigned_at: Option<DateTime<Utc>>,
    /// When the shipper accepted (scanned) the assignment
    pub scanned_at: Option<DateTime<Utc>>,
    /// Failure reason for FAILED assignments
    pub fail_reason: Option<String>,
    /// Actual route distance recorded at completion/failure
    pub distance_m: Option<f64>,
    /// Actual route duration recorded at completion/failure
    pub duration_s: Option<f64>,
    /// Serialized route geometry recorded at completion/failure
    pub waypoints: Option<String>,
    /// Linked parcels in delivery order
    pub parcels: Vec<AssignmentParcel>,
}

impl DeliveryAssignment {
    /// Create a PENDING assignment owning the given parcel ids in order.
    pub fn new(
        shipper_id: impl Into<String>,
        delivery_address_id: impl Into<String>,
        parcel_ids: &[String],
        assigned_at: DateTime<Utc>,
    ) -> Self {
        let parcels = parcel_ids
            .iter()
            .enumerate()
            .map(|(position, parcel_id)| AssignmentParcel {
                parcel_id: parcel_id.clone(),
                position: position as u32,
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            shipper_id: shipper_id.into(),
            delivery_address_id: delivery_address_id.into(),
            status: AssignmentStatus::Pending,
            session_id: None,
            assigned_at: Some(assigned_at),
            scanned_at: None,
            fail_reason: None,
            distance_m: None,
            duration_s: None,
            waypoints: None,
            parcels,
        }
    }

    /// Parcel ids in delivery order.
    pub fn parcel_ids(&self) -> Vec<String> {
        self.parcels.iter().map(|p| p.parcel_id.clone()).collect()
    }

    /// Whether the assignment carries the given parcel.
    pub fn carries_parcel(&self, parcel_id: &str) -> bool {
        self.parcels.iter().any(|p| p.parcel_id == parcel_id)
    }
}

/// Join entity linking an assignment to one external parcel identifier.
///
/// Owned exclusively by its assignment; created with it, never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignmentParcel {
    /// External parcel identifier
    pub parcel_id: String,
    /// Delivery order within the assignment
    pub position: u32,
}

/// One GPS fix for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationSample {
    /// Session the fix belongs to
    pub session_id: String,
    /// Shipper that produced the fix
    pub shipper_id: String,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Server-side timestamp of the fix
    pub recorded_at: DateTime<Utc>,
    /// Reported GPS accuracy in meters
    pub accuracy_m: Option<f64>,
    /// Reported speed in meters per second
    pub speed_mps: Option<f64>,
    /// Nearest road node, when the lookup succeeded
    pub nearest_node_id: Option<String>,
    /// Distance to the nearest road node in meters
    pub distance_to_node_m: Option<f64>,
}

/// Route outcome attached to an assignment when a delivery attempt concludes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteInfo {
    /// Route distance in meters
    pub distance_m: f64,
    /// Route duration in seconds
    pub duration_s: f64,
    /// Ordered waypoint list
    pub waypoints: Vec<Coordinate>,
}

impl RouteInfo {
    /// Serialize the waypoint list for durable storage on the assignment.
    pub fn waypoints_json(&self) -> String {
        serde_json::to_string(&self.waypoints).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use couriercore_core::time::now;

    #[test]
    fn new_assignment_is_pending_with_ordered_parcels() {
        let parcels = vec!["p-1".to_string(), "p-2".to_string(), "p-3".to_string()];
        let assignment = DeliveryAssignment::new("shipper-1", "addr-X", &parcels, now());

        assert_eq!(assignment.status, AssignmentStatus::Pending);
        assert_eq!(assignment.delivery_address_id, "addr-X");
        assert!(assignment.session_id.is_none());
        assert_eq!(assignment.parcel_ids(), parcels);
        assert_eq!(
            assignment.parcels.iter().map(|p| p.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(assignment.carries_parcel("p-2"));
        assert!(!assignment.carries_parcel("p-9"));
    }

    #[test]
    fn new_session_is_created_and_inactive() {
        let session = DeliverySession::new("shipper-1", now());
        assert_eq!(session.status, SessionStatus::Created);
        assert!(!session.is_active());
        assert!(session.assignments.is_empty());
    }

    #[test]
    fn route_info_waypoints_serialize_in_order() {
        let route = RouteInfo {
            distance_m: 1200.0,
            duration_s: 300.0,
            waypoints: vec![
                Coordinate { lat: 10.0, lon: 20.0 },
                Coordinate { lat: 10.1, lon: 20.1 },
            ],
        };

        let json = route.waypoints_json();
        let parsed: Vec<Coordinate> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, route.waypoints);
    }
}
