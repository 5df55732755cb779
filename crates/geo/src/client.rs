//! Route/geometry contract
//!
//! The VRP solve is the single longest-latency call in the system and may
//! take seconds; implementations should carry a request deadline. Absence of
//! a response is treated as solver failure by the caller, never retried here.

use crate::error::GeoError;
use crate::types::{NearestNode, RouteSummary, VrpRequest, VrpResponse};
use couriercore_domain::Coordinate;

/// Contract against the external routing engine.
pub trait RouteGeometry: Send + Sync {
    /// Road nodes within `radius_m` of the coordinate, nearest first.
    fn find_nearest_nodes(
        &self,
        lat: f64,
        lon: f64,
        radius_m: f64,
    ) -> Result<Vec<NearestNode>, GeoError>;

    /// Solve one batched multi-vehicle routing problem.
    fn solve_vrp(&self, request: &VrpRequest) -> Result<VrpResponse, GeoError>;

    /// Compute distance/duration/geometry over an ordered waypoint list.
    fn compute_route(&self, waypoints: &[Coordinate]) -> Result<RouteSummary, GeoError>;
}
