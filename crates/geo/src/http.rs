//! Blocking HTTP route geometry client
//!
//! The solver call carries the client-wide request timeout as its deadline; a
//! timeout surfaces as a transport error and the caller treats it as solver
//! failure.

use crate::client::RouteGeometry;
use crate::error::GeoError;
use crate::types::{NearestNode, RouteSummary, VrpRequest, VrpResponse};
use couriercore_domain::Coordinate;
use serde::Serialize;
use std::time::Duration;

/// HTTP client against the routing engine.
pub struct HttpRouteGeometry {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct RouteBody<'a> {
    waypoints: &'a [Coordinate],
}

impl HttpRouteGeometry {
    /// Create a client for the routing engine at `base_url`.
    ///
    /// `timeout` bounds every request including the VRP solve.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeoError> {
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

impl RouteGeometry for HttpRouteGeometry {
    fn find_nearest_nodes(
        &self,
        lat: f64,
        lon: f64,
        radius_m: f64,
    ) -> Result<Vec<NearestNode>, GeoError> {
        let response = self
            .client
            .get(self.url("/nodes/nearest"))
            .query(&[("lat", lat), ("lon", lon), ("radius_m", radius_m)])
            .send()?;
        if !response.status().is_success() {
            return Err(GeoError::Unavailable(format!(
                "nearest-node lookup returned {}",
                response.status()
            )));
        }
        response
            .json::<Vec<NearestNode>>()
            .map_err(|e| GeoError::Decode(e.to_string()))
    }

    fn solve_vrp(&self, request: &VrpRequest) -> Result<VrpResponse, GeoError> {
        let response = self
            .client
            .post(self.url("/vrp/solve"))
            .json(request)
            .send()?;
        if !response.status().is_success() {
            return Err(GeoError::Solver(format!(
                "solver returned {}",
                response.status()
            )));
        }
        response
            .json::<VrpResponse>()
            .map_err(|e| GeoError::Decode(e.to_string()))
    }

    fn compute_route(&self, waypoints: &[Coordinate]) -> Result<RouteSummary, GeoError> {
        let response = self
            .client
            .post(self.url("/routes/compute"))
            .json(&RouteBody { waypoints })
            .send()?;
        if !response.status().is_success() {
            return Err(GeoError::Unavailable(format!(
                "route computation returned {}",
                response.status()
            )));
        }
        response
            .json::<RouteSummary>()
            .map_err(|e| GeoError::Decode(e.to_string()))
    }
}
