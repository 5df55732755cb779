//! Routing request/response types

use couriercore_domain::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One road-network node near a queried coordinate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearestNode {
    /// Road-network node identifier
    pub node_id: String,
    /// Distance from the queried coordinate in meters
    pub distance_m: f64,
}

/// Vehicle/shipper description submitted to the solver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VrpShipper {
    /// Shipper identifier
    pub id: String,
    /// Current latitude
    pub lat: f64,
    /// Current longitude
    pub lon: f64,
    /// Shift start, epoch milliseconds
    pub shift_start_ms: Option<i64>,
    /// Maximum working-session length in seconds
    pub max_session_s: Option<u64>,
    /// Parcel capacity
    pub capacity: Option<u32>,
    /// Vehicle code
    pub vehicle: String,
}

/// One delivery order submitted to the solver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VrpOrder {
    /// Order identifier (the parcel id)
    pub order_id: String,
    /// Delivery latitude
    pub lat: f64,
    /// Delivery longitude
    pub lon: f64,
    /// Routing priority; lower is more urgent
    pub priority: u32,
}

/// Optimization objective for the solve.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SolveMode {
    /// Minimize total travel time
    #[default]
    Fastest,
    /// Minimize total travel distance
    Shortest,
}

/// One batched multi-vehicle routing request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VrpRequest {
    /// Available shippers
    pub shippers: Vec<VrpShipper>,
    /// Orders to place
    pub orders: Vec<VrpOrder>,
    /// Fleet vehicle code
    pub vehicle: String,
    /// Optimization objective
    pub mode: SolveMode,
}

/// One routed task inside a shipper's solved task list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolvedTask {
    /// Order identifier (the parcel id)
    pub order_id: String,
    /// Position in the shipper's route
    pub sequence: u32,
    /// Estimated arrival offset from route start, seconds
    pub eta_s: Option<f64>,
}

/// Aggregate figures reported by the solver, passed through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VrpStatistics {
    /// Total routed distance in meters
    pub total_distance_m: f64,
    /// Total routed duration in seconds
    pub total_duration_s: f64,
}

/// Solver response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VrpResponse {
    /// Whether the solve succeeded
    pub success: bool,
    /// Solver message, populated on failure
    pub message: Option<String>,
    /// Ordered task list per shipper
    pub assignments: HashMap<String, Vec<SolvedTask>>,
    /// Order ids the solver could not place
    pub unassigned_orders: Vec<String>,
    /// Aggregate route figures
    pub statistics: Option<VrpStatistics>,
}

/// Computed route over a waypoint list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteSummary {
    /// Route distance in meters
    pub distance_m: f64,
    /// Route duration in seconds
    pub duration_s: f64,
    /// Route geometry
    pub steps: Vec<Coordinate>,
}
