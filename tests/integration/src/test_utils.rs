//! Shared fixtures for the integration tests

use couriercore_dispatch::{AssignmentOrchestrator, SessionLifecycle};
use couriercore_events::RecordingEventPublisher;
use couriercore_geo::StaticRouteGeometry;
use couriercore_registry::{
    DeliveryClass, InMemoryParcelRegistry, InMemoryShipperDirectory, ParcelRecord,
    ShipperProfile, VehicleType,
};
use couriercore_store::DeliveryStore;
use couriercore_tracking::{TrackingConfig, TrackingEngine, TrackingPoint};
use std::sync::Arc;

/// Reference point for geometry fixtures (Berlin, Alexanderplatz).
pub const BASE_LAT: f64 = 52.5219;
pub const BASE_LON: f64 = 13.4132;

/// Roughly 40 m north of a reference latitude, in degrees.
pub const DEG_40_M: f64 = 40.0 / 111_195.0;

/// The full core wired over in-memory collaborators.
pub struct TestEnv {
    pub store: Arc<DeliveryStore>,
    pub registry: Arc<InMemoryParcelRegistry>,
    pub shippers: Arc<InMemoryShipperDirectory>,
    pub geometry: Arc<StaticRouteGeometry>,
    pub publisher: Arc<RecordingEventPublisher>,
    pub lifecycle: SessionLifecycle,
    pub orchestrator: AssignmentOrchestrator,
    pub tracking: TrackingEngine,
}

impl TestEnv {
    pub fn new() -> Self {
        let store = Arc::new(DeliveryStore::open_in_memory().unwrap());
        let registry = Arc::new(InMemoryParcelRegistry::new());
        let shippers = Arc::new(InMemoryShipperDirectory::new());
        let geometry = Arc::new(StaticRouteGeometry::new());
        let publisher = Arc::new(RecordingEventPublisher::new());

        let lifecycle = SessionLifecycle::new(Arc::clone(&store), registry.clone());
        let orchestrator = AssignmentOrchestrator::new(
            Arc::clone(&store),
            registry.clone(),
            shippers.clone(),
            geometry.clone(),
        );
        let tracking_store: Arc<dyn couriercore_tracking::TrackingStore> = store.clone();
        let tracking = TrackingEngine::new(
            tracking_store,
            geometry.clone(),
            publisher.clone(),
            TrackingConfig::default(),
        );

        TestEnv {
            store,
            registry,
            shippers,
            geometry,
            publisher,
            lifecycle,
            orchestrator,
            tracking,
        }
    }

    /// Seed a geocoded standard-class parcel.
    pub fn seed_parcel(&self, id: &str, address: &str) {
        self.registry.insert(ParcelRecord {
            id: id.to_string(),
            receiver_address_id: address.to_string(),
            lat: Some(BASE_LAT),
            lon: Some(BASE_LON),
            delivery_class: DeliveryClass::Standard,
            status: "REGISTERED".to_string(),
        });
    }

    /// Seed a shipper capability record.
    pub fn seed_shipper(&self, id: &str) {
        self.shippers.insert(ShipperProfile {
            id: id.to_string(),
            lat: BASE_LAT,
            lon: BASE_LON,
            shift_start: None,
            max_session_s: Some(8 * 3600),
            capacity: Some(30),
            vehicle: VehicleType::Car,
            zones: vec!["zone-1".to_string()],
        });
    }

    /// Accept an assignment and drive it into a started session; returns
    /// the session id.
    pub fn start_session_with(&self, shipper_id: &str, assignment_ids: &[String]) -> String {
        for id in assignment_ids {
            self.lifecycle.accept_assignment(shipper_id, id).unwrap();
        }
        let session = self
            .lifecycle
            .create_session(shipper_id, assignment_ids)
            .unwrap();
        self.lifecycle.start_session(&session.id).unwrap();
        session.id
    }
}

/// A tracking point at the given coordinate with a fixed client timestamp.
pub fn tracking_point(lat: f64, lon: f64) -> TrackingPoint {
    TrackingPoint {
        lat,
        lon,
        recorded_at_ms: Some(1_700_000_000_000),
        accuracy_m: Some(5.0),
        speed_mps: Some(6.5),
    }
}
