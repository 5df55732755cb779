//! Tracking engine
//!
//! Per-call pipeline for one location sample:
//! 1. Resolve the session; absent is an error, inactive is accepted but
//!    ignored (logged only).
//! 2. Convert the client epoch timestamp to server time (default now).
//! 3. Best-effort nearest-node lookup within the configured radius; failure
//!    or an empty result never aborts the call.
//! 4. First-time passage detection against the rolling window within the
//!    passed threshold; repeats publish nothing.
//! 5. Durable persist; a failure is logged and the pipeline continues.
//! 6. FIFO window append with eviction beyond the configured maximum.
//! 7. Unconditional LOCATION_UPDATE.
//!
//! The session's window mutex is held across steps 3-7, which serializes
//! same-session calls and keeps LOCATION_UPDATE publication in ingestion
//! order per session.

use crate::error::TrackError;
use crate::window::WindowCache;
use crate::TrackingStore;
use couriercore_core::time::{from_epoch_ms, to_epoch_ms};
use couriercore_domain::{LocationSample, SessionStatus};
use couriercore_events::{EventPublisher, TrackingEvent};
use couriercore_geo::{NearestNode, RouteGeometry};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tracking engine configuration; every knob is externally settable.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Radius for the nearest-node lookup, meters
    pub node_radius_m: f64,
    /// Distance within which a node counts as passed, meters
    pub passed_threshold_m: f64,
    /// Maximum samples held per session window
    pub window_max: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            node_radius_m: 100.0,
            passed_threshold_m: 50.0,
            window_max: 5,
        }
    }
}

/// One inbound location fix as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingPoint {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Client epoch timestamp, milliseconds; server time is used if absent
    pub recorded_at_ms: Option<i64>,
    /// Reported GPS accuracy in meters
    pub accuracy_m: Option<f64>,
    /// Reported speed in meters per second
    pub speed_mps: Option<f64>,
}

/// Result of ingesting one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// The session is not IN_PROGRESS; the sample was accepted but ignored.
    Ignored {
        /// The session's current status
        status: SessionStatus,
    },
    /// The sample was processed.
    Recorded {
        /// Nearest road node, when the lookup found one in radius
        nearest_node: Option<NearestNode>,
        /// Whether this sample produced a NODE_PASSED event
        node_passed: bool,
    },
}

/// Location tracking engine.
pub struct TrackingEngine {
    store: Arc<dyn TrackingStore>,
    geometry: Arc<dyn RouteGeometry>,
    publisher: Arc<dyn EventPublisher>,
    cache: WindowCache,
    config: TrackingConfig,
}

impl TrackingEngine {
    /// Create the engine over its collaborators.
    pub fn new(
        store: Arc<dyn TrackingStore>,
        geometry: Arc<dyn RouteGeometry>,
        publisher: Arc<dyn EventPublisher>,
        config: TrackingConfig,
    ) -> Self {
        let cache = WindowCache::new(config.window_max);
        Self {
            store,
            geometry,
            publisher,
            cache,
            config,
        }
    }

    /// Ingest one location sample for a session.
    pub fn add_tracking_point(
        &self,
        session_id: &str,
        point: &TrackingPoint,
    ) -> Result<TrackOutcome, TrackError> {
        let (status, shipper_id) = self
            .store
            .session_summary(session_id)?
            .ok_or_else(|| TrackError::SessionNotFound(session_id.to_string()))?;

        if status != SessionStatus::InProgress {
            debug!(
                session_id = session_id,
                status = status.as_str(),
                "Sample ignored: session not in progress"
            );
            return Ok(TrackOutcome::Ignored { status });
        }

        let recorded_at = from_epoch_ms(point.recorded_at_ms);

        // Per-session critical section: detection, persistence, window
        // append, and publication all happen under this lock so concurrent
        // same-session calls cannot reorder events.
        let slot = self.cache.slot(session_id);
        let mut window = slot.lock().expect("window poisoned");

        let nearest = match self.geometry.find_nearest_nodes(
            point.lat,
            point.lon,
            self.config.node_radius_m,
        ) {
            Ok(nodes) => nodes.into_iter().next(),
            Err(e) => {
                warn!(
                    session_id = session_id,
                    error = %e,
                    "Nearest-node lookup failed; continuing without node"
                );
                None
            }
        };

        let sample = LocationSample {
            session_id: session_id.to_string(),
            shipper_id: shipper_id.clone(),
            lat: point.lat,
            lon: point.lon,
            recorded_at,
            accuracy_m: point.accuracy_m,
            speed_mps: point.speed_mps,
            nearest_node_id: nearest.as_ref().map(|n| n.node_id.clone()),
            distance_to_node_m: nearest.as_ref().map(|n| n.distance_m),
        };

        let mut node_passed = false;
        if let Some(node) = &nearest {
            if node.distance_m <= self.config.passed_threshold_m
                && !window.has_node_within(&node.node_id, self.config.passed_threshold_m)
            {
                node_passed = true;
                info!(
                    session_id = session_id,
                    node_id = %node.node_id,
                    distance_m = node.distance_m,
                    "Node passed"
                );
                self.publisher.publish(TrackingEvent::NodePassed {
                    session_id: session_id.to_string(),
                    shipper_id: shipper_id.clone(),
                    node_id: node.node_id.clone(),
                    distance_m: node.distance_m,
                    recorded_at_ms: to_epoch_ms(recorded_at),
                });
            }
        }

        if let Err(e) = self.store.record_sample(&sample) {
            warn!(
                session_id = session_id,
                error = %e,
                "Sample persistence failed; window and events continue"
            );
        }

        window.push(sample.clone());

        self.publisher.publish(TrackingEvent::LocationUpdate {
            session_id: session_id.to_string(),
            shipper_id,
            lat: point.lat,
            lon: point.lon,
            recorded_at_ms: to_epoch_ms(recorded_at),
            nearest_node_id: sample.nearest_node_id,
        });

        Ok(TrackOutcome::Recorded {
            nearest_node: nearest,
            node_passed,
        })
    }

    /// Release a session's rolling window.
    ///
    /// Called exactly once when a session leaves IN_PROGRESS.
    pub fn clear_cache(&self, session_id: &str) -> bool {
        let removed = self.cache.remove(session_id);
        if removed {
            info!(session_id = session_id, "Tracking window released");
        }
        removed
    }

    /// Number of sessions currently holding a window.
    pub fn active_windows(&self) -> usize {
        self.cache.active_sessions()
    }

    /// The engine's configuration.
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }
}
