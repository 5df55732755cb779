use couriercore_dispatch::{AssignmentOrchestrator, SessionLifecycle};
use couriercore_events::BroadcastEventPublisher;
use couriercore_geo::HttpRouteGeometry;
use couriercore_registry::HttpRegistryClient;
use couriercore_store::DeliveryStore;
use couriercore_tracking::{TrackingConfig, TrackingEngine};
use std::sync::Arc;

use crate::config::Config;

pub struct AppState {
    pub lifecycle: Arc<SessionLifecycle>,
    pub orchestrator: Arc<AssignmentOrchestrator>,
    pub tracking: Arc<TrackingEngine>,
    pub geometry: Arc<HttpRouteGeometry>,
    pub events: Arc<BroadcastEventPublisher>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(DeliveryStore::open(&config.database_path)?);
        let registry = Arc::new(HttpRegistryClient::new(
            config.registry_url.clone(),
            config.upstream_timeout,
        )?);
        let geometry = Arc::new(HttpRouteGeometry::new(
            config.geometry_url.clone(),
            config.upstream_timeout,
        )?);
        let events = Arc::new(BroadcastEventPublisher::new(config.event_capacity));

        let lifecycle = Arc::new(SessionLifecycle::new(
            Arc::clone(&store),
            registry.clone(),
        ));
        let orchestrator = Arc::new(AssignmentOrchestrator::new(
            Arc::clone(&store),
            registry.clone(),
            registry.clone(),
            geometry.clone(),
        ));
        let tracking = Arc::new(TrackingEngine::new(
            store,
            geometry.clone(),
            events.clone(),
            TrackingConfig {
                node_radius_m: config.node_radius_m,
                passed_threshold_m: config.passed_threshold_m,
                window_max: config.window_max,
            },
        ));

        Ok(AppState {
            lifecycle,
            orchestrator,
            tracking,
            geometry,
            events,
        })
    }
}
