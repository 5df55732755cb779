//! Tracking events and the publisher contract
//!
//! Downstream consumers (chat/notification transport) receive these events
//! over whatever transport the deployment wires in. Delivery is
//! fire-and-forget; this core assumes no delivery guarantee.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Event published by the tracking engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TrackingEvent {
    /// Published for every accepted location sample, in ingestion order
    /// per session.
    #[serde(rename = "LOCATION_UPDATE")]
    LocationUpdate {
        /// Session the sample belongs to
        session_id: String,
        /// Shipper that produced the sample
        shipper_id: String,
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lon: f64,
        /// Sample timestamp, epoch milliseconds
        recorded_at_ms: i64,
        /// Nearest road node, when the lookup found one
        nearest_node_id: Option<String>,
    },
    /// Published once per (session, node) first-time passage.
    #[serde(rename = "NODE_PASSED")]
    NodePassed {
        /// Session that passed the node
        session_id: String,
        /// Shipper that passed the node
        shipper_id: String,
        /// Road-network node identifier
        node_id: String,
        /// Distance to the node at detection, meters
        distance_m: f64,
        /// Sample timestamp, epoch milliseconds
        recorded_at_ms: i64,
    },
}

impl TrackingEvent {
    /// Session the event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            TrackingEvent::LocationUpdate { session_id, .. } => session_id,
            TrackingEvent::NodePassed { session_id, .. } => session_id,
        }
    }
}

/// Fire-and-forget event publisher.
///
/// `publish` never fails and never blocks on downstream consumers: an
/// implementation that cannot deliver drops the event (optionally logging
/// it). Callers need no error handling around publication.
pub trait EventPublisher: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: TrackingEvent);
}

/// Publisher fanning events out over a tokio broadcast channel.
///
/// Slow or absent subscribers lose events; that matches the no-guarantee
/// contract.
pub struct BroadcastEventPublisher {
    tx: broadcast::Sender<TrackingEvent>,
}

impl BroadcastEventPublisher {
    /// Create a publisher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe a new consumer.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: TrackingEvent) {
        // send only errors when no receiver is subscribed; the event is
        // dropped per the no-guarantee contract.
        if self.tx.send(event).is_err() {
            debug!("tracking event dropped: no subscribers");
        }
    }
}

/// Publisher that records every event; intended for tests.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<TrackingEvent>>,
}

impl RecordingEventPublisher {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far, in publication order.
    pub fn events(&self) -> Vec<TrackingEvent> {
        self.events.lock().expect("event log poisoned").clone()
    }

    /// Count of NODE_PASSED events published so far.
    pub fn node_passed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TrackingEvent::NodePassed { .. }))
            .count()
    }
}

impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: TrackingEvent) {
        self.events.lock().expect("event log poisoned").push(event);
    }
}
