//! Per-session rolling windows
//!
//! The window cache is the only process-wide shared mutable structure in
//! the system. It is key-sharded: calls for different sessions contend only
//! on the brief map lookup, while calls for the same session serialize on
//! that session's mutex. The per-key mutex is held by the engine across the
//! whole ingestion step, which is what gives LOCATION_UPDATE its per-session
//! ordering guarantee.
//!
//! Eviction is FIFO by insertion order, never by access recency.

use couriercore_domain::LocationSample;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

/// Bounded most-recent-N sample history for one session.
#[derive(Debug)]
pub struct RollingWindow {
    capacity: usize,
    samples: VecDeque<LocationSample>,
}

impl RollingWindow {
    /// Empty window holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest once the bound is exceeded.
    pub fn push(&mut self, sample: LocationSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Samples in insertion order, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &LocationSample> {
        self.samples.iter()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether any held sample already recorded the given node within the
    /// passed threshold. Used to suppress duplicate NODE_PASSED events.
    pub fn has_node_within(&self, node_id: &str, threshold_m: f64) -> bool {
        self.samples.iter().any(|sample| {
            sample.nearest_node_id.as_deref() == Some(node_id)
                && sample
                    .distance_to_node_m
                    .is_some_and(|d| d <= threshold_m)
        })
    }
}

/// Concurrency-safe session-to-window map.
pub struct WindowCache {
    capacity: usize,
    windows: RwLock<HashMap<String, Arc<Mutex<RollingWindow>>>>,
}

impl WindowCache {
    /// Empty cache; every window it creates holds at most `capacity`
    /// samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// The window slot for a session, created on first use.
    ///
    /// Callers lock the returned mutex for the duration of their per-session
    /// critical section.
    pub fn slot(&self, session_id: &str) -> Arc<Mutex<RollingWindow>> {
        if let Some(slot) = self
            .windows
            .read()
            .expect("window map poisoned")
            .get(session_id)
        {
            return Arc::clone(slot);
        }

        let mut windows = self.windows.write().expect("window map poisoned");
        Arc::clone(
            windows
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(RollingWindow::new(self.capacity)))),
        )
    }

    /// Drop a session's window. Returns whether an entry existed.
    ///
    /// Called once when a session leaves IN_PROGRESS, so memory is bounded
    /// by active-session count, not all-time session count.
    pub fn remove(&self, session_id: &str) -> bool {
        self.windows
            .write()
            .expect("window map poisoned")
            .remove(session_id)
            .is_some()
    }

    /// Number of sessions currently holding a window.
    pub fn active_sessions(&self) -> usize {
        self.windows.read().expect("window map poisoned").len()
    }
}
