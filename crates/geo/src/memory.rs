//! Static route geometry for fixtures and tests
//!
//! Nearest-node queries run over a fixed node set with haversine distances.
//! VRP solves return a scripted response when one is set, otherwise a naive
//! everything-to-the-first-shipper placement so local setups work without a
//! real solver. `fail_nearest_lookups` simulates a degraded geometry service.

use crate::client::RouteGeometry;
use crate::error::GeoError;
use crate::haversine_m;
use crate::types::{NearestNode, RouteSummary, SolvedTask, VrpRequest, VrpResponse};
use couriercore_domain::Coordinate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Assumed average speed for naive route durations, meters per second.
const NAIVE_SPEED_MPS: f64 = 8.33;

/// One fixed road-network node.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadNode {
    /// Node identifier
    pub node_id: String,
    /// Node latitude
    pub lat: f64,
    /// Node longitude
    pub lon: f64,
}

/// Static geometry backend.
#[derive(Default)]
pub struct StaticRouteGeometry {
    nodes: Mutex<Vec<RoadNode>>,
    scripted_solution: Mutex<Option<VrpResponse>>,
    fail_nearest: AtomicBool,
}

impl StaticRouteGeometry {
    /// Empty backend with no nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a road node to the fixed network.
    pub fn add_node(&self, node_id: impl Into<String>, lat: f64, lon: f64) {
        self.nodes.lock().expect("node set poisoned").push(RoadNode {
            node_id: node_id.into(),
            lat,
            lon,
        });
    }

    /// Script the next and all following VRP solves.
    pub fn set_solution(&self, response: VrpResponse) {
        *self.scripted_solution.lock().expect("solution poisoned") = Some(response);
    }

    /// Make nearest-node lookups fail until reset.
    pub fn fail_nearest_lookups(&self, fail: bool) {
        self.fail_nearest.store(fail, Ordering::SeqCst);
    }
}

impl RouteGeometry for StaticRouteGeometry {
    fn find_nearest_nodes(
        &self,
        lat: f64,
        lon: f64,
        radius_m: f64,
    ) -> Result<Vec<NearestNode>, GeoError> {
        if self.fail_nearest.load(Ordering::SeqCst) {
            return Err(GeoError::Unavailable(
                "nearest-node lookup disabled".to_string(),
            ));
        }

        let mut matches: Vec<NearestNode> = self
            .nodes
            .lock()
            .expect("node set poisoned")
            .iter()
            .map(|node| NearestNode {
                node_id: node.node_id.clone(),
                distance_m: haversine_m(lat, lon, node.lat, node.lon),
            })
            .filter(|n| n.distance_m <= radius_m)
            .collect();
        matches.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        Ok(matches)
    }

    fn solve_vrp(&self, request: &VrpRequest) -> Result<VrpResponse, GeoError> {
        if let Some(scripted) = self.scripted_solution.lock().expect("solution poisoned").clone() {
            return Ok(scripted);
        }

        let Some(first_shipper) = request.shippers.first() else {
            return Ok(VrpResponse {
                success: false,
                message: Some("no shippers in request".to_string()),
                assignments: HashMap::new(),
                unassigned_orders: request.orders.iter().map(|o| o.order_id.clone()).collect(),
                statistics: None,
            });
        };

        let tasks: Vec<SolvedTask> = request
            .orders
            .iter()
            .enumerate()
            .map(|(i, order)| SolvedTask {
                order_id: order.order_id.clone(),
                sequence: i as u32,
                eta_s: None,
            })
            .collect();

        let mut assignments = HashMap::new();
        assignments.insert(first_shipper.id.clone(), tasks);

        Ok(VrpResponse {
            success: true,
            message: None,
            assignments,
            unassigned_orders: Vec::new(),
            statistics: None,
        })
    }

    fn compute_route(&self, waypoints: &[Coordinate]) -> Result<RouteSummary, GeoError> {
        let distance_m: f64 = waypoints
            .windows(2)
            .map(|pair| haversine_m(pair[0].lat, pair[0].lon, pair[1].lat, pair[1].lon))
            .sum();

        Ok(RouteSummary {
            distance_m,
            duration_s: distance_m / NAIVE_SPEED_MPS,
            steps: waypoints.to_vec(),
        })
    }
}
