//! Route and geometry contract
//!
//! The actual routing engine (VRP solving, road-network matching) is an
//! external service; this crate defines the request/response contract, a
//! static implementation for fixtures and tests, and a blocking HTTP
//! implementation for deployment.

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use client::RouteGeometry;
pub use error::GeoError;
pub use http::HttpRouteGeometry;
pub use memory::{RoadNode, StaticRouteGeometry};
pub use types::{
    NearestNode, RouteSummary, SolveMode, SolvedTask, VrpOrder, VrpRequest, VrpResponse,
    VrpShipper, VrpStatistics,
};

/// Great-circle distance between two coordinates in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}
