//! Auto-assignment orchestrator
//!
//! Converts a pool of unassigned parcels and available shippers into
//! assignments. Manual mode builds one assignment for one shipper from an
//! explicit parcel list; automatic mode batches everything into a single
//! external VRP solve and persists one assignment per (shipper, delivery
//! address) group, regardless of how the solver interleaves addresses
//! within a route.
//!
//! Any abort before persistence leaves no partial assignment. Once
//! persistence begins, each group is committed independently: one failed
//! group does not roll back previously committed groups.

use crate::error::{DispatchError, Result};
use couriercore_core::time::now;
use couriercore_domain::DeliveryAssignment;
use couriercore_geo::{GeoError, RouteGeometry, SolveMode, VrpOrder, VrpRequest, VrpShipper};
use couriercore_registry::{
    DeliveryClass, ParcelRecord, ParcelRegistry, ShipperDirectory, ShipperProfile,
};
use couriercore_store::DeliveryStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Which parcels feed an automatic assignment round.
#[derive(Debug, Clone)]
pub enum ParcelSelection {
    /// Every parcel the registry reports as awaiting assignment.
    All,
    /// An explicit candidate list.
    Ids(Vec<String>),
}

/// A delivery zone restricting a manual assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Zone identifier
    pub id: String,
}

impl Zone {
    /// Whether a coordinate lies in the zone.
    ///
    /// TODO: evaluate the zone polygon once zone geometry is served by the
    /// shipper directory; until then every geocoded parcel is kept.
    pub fn contains(&self, _lat: f64, _lon: f64) -> bool {
        true
    }
}

/// Fairness and volume figures for one automatic assignment round.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkloadSummary {
    /// Shippers that received at least one assignment
    pub shippers_used: usize,
    /// Candidate parcels after dropping already-assigned ones
    pub total_parcels: usize,
    /// Parcels actually placed into persisted assignments
    pub assigned_parcels: usize,
    /// Mean assigned parcels per used shipper
    pub mean_parcels_per_shipper: f64,
    /// Population variance of per-shipper assigned-parcel counts
    pub workload_variance: f64,
}

/// Result of one automatic assignment round.
#[derive(Debug, Clone, Serialize)]
pub struct AutoAssignOutcome {
    /// Assignments persisted this round
    pub created: Vec<DeliveryAssignment>,
    /// Order ids the solver reported unassigned, passed through unchanged
    pub unassigned_order_ids: Vec<String>,
    /// Groups whose persistence failed after the solve
    pub failed_groups: usize,
    /// Fairness and volume figures
    pub summary: WorkloadSummary,
}

/// Builds assignments from parcels, shippers, and the external solver.
pub struct AssignmentOrchestrator {
    store: Arc<DeliveryStore>,
    registry: Arc<dyn ParcelRegistry>,
    shippers: Arc<dyn ShipperDirectory>,
    geometry: Arc<dyn RouteGeometry>,
}

impl AssignmentOrchestrator {
    /// Create the orchestrator over its collaborators.
    pub fn new(
        store: Arc<DeliveryStore>,
        registry: Arc<dyn ParcelRegistry>,
        shippers: Arc<dyn ShipperDirectory>,
        geometry: Arc<dyn RouteGeometry>,
    ) -> Self {
        Self {
            store,
            registry,
            shippers,
            geometry,
        }
    }

    /// Create one PENDING assignment for an explicit parcel list.
    ///
    /// All parcels must exist and share one delivery address; a zone filter
    /// drops parcels lacking coordinates with a warning. The
    /// double-assignment check runs inside the store's insert transaction.
    pub fn create_manual_assignment(
        &self,
        shipper_id: &str,
        parcel_ids: &[String],
        zone: Option<&Zone>,
    ) -> Result<DeliveryAssignment> {
        if parcel_ids.is_empty() {
            return Err(DispatchError::Validation(
                "an assignment requires at least one parcel".to_string(),
            ));
        }

        let mut parcels = Vec::with_capacity(parcel_ids.len());
        for parcel_id in parcel_ids {
            let record =
                self.registry
                    .fetch_parcel(parcel_id)?
                    .ok_or_else(|| DispatchError::NotFound {
                        entity: "parcel",
                        id: parcel_id.clone(),
                    })?;
            parcels.push(record);
        }

        let address = parcels[0].receiver_address_id.clone();
        for parcel in &parcels {
            if parcel.receiver_address_id != address {
                return Err(DispatchError::Validation(format!(
                    "parcel {} has delivery address {} (expected {})",
                    parcel.id, parcel.receiver_address_id, address
                )));
            }
        }

        let surviving: Vec<&ParcelRecord> = match zone {
            Some(zone) => parcels
                .iter()
                .filter(|parcel| match parcel.coordinates() {
                    Some((lat, lon)) => zone.contains(lat, lon),
                    None => {
                        warn!(
                            parcel_id = %parcel.id,
                            zone = %zone.id,
                            "Dropping parcel from zoned assignment: no coordinates"
                        );
                        false
                    }
                })
                .collect(),
            None => parcels.iter().collect(),
        };

        if surviving.is_empty() {
            return Err(DispatchError::Validation(
                "no parcels remain after zone filtering".to_string(),
            ));
        }

        let surviving_ids: Vec<String> = surviving.iter().map(|p| p.id.clone()).collect();
        let assignment =
            DeliveryAssignment::new(shipper_id, address.clone(), &surviving_ids, now());
        self.store.insert_assignment(&assignment)?;

        info!(
            assignment_id = %assignment.id,
            shipper_id = shipper_id,
            address_id = %address,
            parcels = surviving_ids.len(),
            "Manual assignment created"
        );
        Ok(assignment)
    }

    /// Run one automatic assignment round over the external solver.
    pub fn create_auto_assignment(
        &self,
        shipper_ids: &[String],
        selection: &ParcelSelection,
        vehicle: &str,
        mode: SolveMode,
    ) -> Result<AutoAssignOutcome> {
        // 1. Candidate parcels, minus everything already in an open
        //    assignment.
        let fetched: Vec<ParcelRecord> = match selection {
            ParcelSelection::All => self.registry.fetch_unassigned()?,
            ParcelSelection::Ids(ids) => {
                if ids.is_empty() {
                    return Err(DispatchError::Validation(
                        "an explicit parcel selection must not be empty".to_string(),
                    ));
                }
                let mut records: Vec<ParcelRecord> =
                    self.registry.fetch_parcels_bulk(ids)?.into_values().collect();
                records.sort_by(|a, b| a.id.cmp(&b.id));
                records
            }
        };

        let fetched_ids: Vec<String> = fetched.iter().map(|p| p.id.clone()).collect();
        let already_open = self.store.open_parcel_ids(&fetched_ids)?;
        let candidates: Vec<ParcelRecord> = fetched
            .into_iter()
            .filter(|p| !already_open.contains(&p.id))
            .collect();

        if candidates.is_empty() {
            return Err(DispatchError::Validation(
                "no unassigned parcels remain".to_string(),
            ));
        }

        // 2. Shipper capability records.
        let profiles = self.shippers.fetch_profiles(shipper_ids)?;
        if profiles.is_empty() {
            return Err(DispatchError::Validation(
                "no shipper capability records available".to_string(),
            ));
        }

        // 3. Parcels become routing orders; priority from the delivery
        //    class ordinal, coordinate-less parcels dropped.
        let mut orders = Vec::with_capacity(candidates.len());
        for parcel in &candidates {
            let Some((lat, lon)) = parcel.coordinates() else {
                warn!(parcel_id = %parcel.id, "Dropping parcel from solve: no coordinates");
                continue;
            };
            if parcel.delivery_class == DeliveryClass::Unknown {
                warn!(
                    parcel_id = %parcel.id,
                    "Unrecognized delivery class; using default routing priority"
                );
            }
            orders.push(VrpOrder {
                order_id: parcel.id.clone(),
                lat,
                lon,
                priority: parcel.delivery_class.route_priority(),
            });
        }

        if orders.is_empty() {
            return Err(DispatchError::Validation(
                "no routable orders remain after dropping parcels without coordinates"
                    .to_string(),
            ));
        }

        // 4. One batched solve.
        let request = VrpRequest {
            shippers: profiles.iter().map(vrp_shipper).collect(),
            orders,
            vehicle: vehicle.to_string(),
            mode,
        };
        let response = self.geometry.solve_vrp(&request)?;
        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "solver returned no result".to_string());
            return Err(DispatchError::Geometry(GeoError::Solver(message)));
        }

        // 5./6. Group each shipper's solved tasks by parcel delivery
        //    address and persist one assignment per group, independently.
        let parcel_by_id: HashMap<&str, &ParcelRecord> =
            candidates.iter().map(|p| (p.id.as_str(), p)).collect();

        let mut created = Vec::new();
        let mut failed_groups = 0usize;
        let mut per_shipper_counts: HashMap<String, usize> = HashMap::new();

        let mut shipper_ids_sorted: Vec<&String> = response.assignments.keys().collect();
        shipper_ids_sorted.sort();

        for shipper_id in shipper_ids_sorted {
            let tasks = &response.assignments[shipper_id];
            let mut groups: Vec<(String, Vec<String>)> = Vec::new();
            let mut group_index: HashMap<String, usize> = HashMap::new();

            for task in tasks {
                let Some(parcel) = parcel_by_id.get(task.order_id.as_str()) else {
                    warn!(
                        shipper_id = %shipper_id,
                        order_id = %task.order_id,
                        "Skipping solved task: parcel could not be resolved"
                    );
                    continue;
                };
                let address = parcel.receiver_address_id.clone();
                match group_index.get(&address) {
                    Some(&i) => groups[i].1.push(parcel.id.clone()),
                    None => {
                        group_index.insert(address.clone(), groups.len());
                        groups.push((address, vec![parcel.id.clone()]));
                    }
                }
            }

            for (address, parcel_ids) in groups {
                let assignment = DeliveryAssignment::new(
                    shipper_id.clone(),
                    address.clone(),
                    &parcel_ids,
                    now(),
                );
                match self.store.insert_assignment(&assignment) {
                    Ok(()) => {
                        *per_shipper_counts.entry(shipper_id.clone()).or_default() +=
                            parcel_ids.len();
                        created.push(assignment);
                    }
                    Err(e) => {
                        warn!(
                            shipper_id = %shipper_id,
                            address_id = %address,
                            error = %e,
                            "Failed to persist assignment group; continuing with remaining groups"
                        );
                        failed_groups += 1;
                    }
                }
            }
        }

        // 7. Fairness and volume figures.
        let counts: Vec<usize> = per_shipper_counts.values().copied().collect();
        let assigned_parcels: usize = counts.iter().sum();
        let shippers_used = counts.len();
        let mean = if shippers_used == 0 {
            0.0
        } else {
            assigned_parcels as f64 / shippers_used as f64
        };

        let summary = WorkloadSummary {
            shippers_used,
            total_parcels: candidates.len(),
            assigned_parcels,
            mean_parcels_per_shipper: mean,
            workload_variance: population_variance(&counts),
        };

        info!(
            shippers_used = summary.shippers_used,
            assigned_parcels = summary.assigned_parcels,
            unassigned = response.unassigned_orders.len(),
            failed_groups = failed_groups,
            "Automatic assignment round complete"
        );

        Ok(AutoAssignOutcome {
            created,
            unassigned_order_ids: response.unassigned_orders,
            failed_groups,
            summary,
        })
    }
}

fn vrp_shipper(profile: &ShipperProfile) -> VrpShipper {
    VrpShipper {
        id: profile.id.clone(),
        lat: profile.lat,
        lon: profile.lon,
        shift_start_ms: profile.shift_start.map(|t| t.timestamp_millis()),
        max_session_s: profile.max_session_s,
        capacity: profile.capacity,
        vehicle: profile.vehicle.as_str().to_string(),
    }
}

/// Population variance: mean of squared deviations from the mean.
/// Zero for an empty population.
fn population_variance(counts: &[usize]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    counts
        .iter()
        .map(|&c| {
            let d = c as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / counts.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use couriercore_geo::{SolvedTask, StaticRouteGeometry, VrpResponse};
    use couriercore_registry::{
        InMemoryParcelRegistry, InMemoryShipperDirectory, VehicleType,
    };
    use proptest::prelude::*;

    fn parcel(id: &str, address: &str) -> ParcelRecord {
        ParcelRecord {
            id: id.to_string(),
            receiver_address_id: address.to_string(),
            lat: Some(52.52),
            lon: Some(13.405),
            delivery_class: DeliveryClass::Standard,
            status: "REGISTERED".to_string(),
        }
    }

    fn profile(id: &str) -> ShipperProfile {
        ShipperProfile {
            id: id.to_string(),
            lat: 52.5,
            lon: 13.4,
            shift_start: None,
            max_session_s: Some(8 * 3600),
            capacity: Some(20),
            vehicle: VehicleType::Car,
            zones: vec!["zone-1".to_string()],
        }
    }

    struct Env {
        store: Arc<DeliveryStore>,
        registry: Arc<InMemoryParcelRegistry>,
        shippers: Arc<InMemoryShipperDirectory>,
        geometry: Arc<StaticRouteGeometry>,
        orchestrator: AssignmentOrchestrator,
    }

    fn env() -> Env {
        let store = Arc::new(DeliveryStore::open_in_memory().unwrap());
        let registry = Arc::new(InMemoryParcelRegistry::new());
        let shippers = Arc::new(InMemoryShipperDirectory::new());
        let geometry = Arc::new(StaticRouteGeometry::new());
        let orchestrator = AssignmentOrchestrator::new(
            Arc::clone(&store),
            registry.clone(),
            shippers.clone(),
            geometry.clone(),
        );
        Env {
            store,
            registry,
            shippers,
            geometry,
            orchestrator,
        }
    }

    #[test]
    fn manual_assignment_groups_same_address_parcels() {
        // Two parcels, one address -> one PENDING assignment with both.
        let env = env();
        env.registry.insert(parcel("p-1", "addr-X"));
        env.registry.insert(parcel("p-2", "addr-X"));

        let assignment = env
            .orchestrator
            .create_manual_assignment(
                "shipper-1",
                &["p-1".to_string(), "p-2".to_string()],
                None,
            )
            .unwrap();

        assert_eq!(assignment.delivery_address_id, "addr-X");
        assert_eq!(assignment.parcel_ids(), vec!["p-1", "p-2"]);
        let stored = env.store.get_assignment(&assignment.id).unwrap().unwrap();
        assert_eq!(stored.parcels.len(), 2);
    }

    #[test]
    fn manual_assignment_rejects_mixed_addresses() {
        let env = env();
        env.registry.insert(parcel("p-1", "addr-X"));
        env.registry.insert(parcel("p-3", "addr-Y"));

        let result = env.orchestrator.create_manual_assignment(
            "shipper-1",
            &["p-1".to_string(), "p-3".to_string()],
            None,
        );

        match result {
            Err(DispatchError::Validation(message)) => {
                // The offending parcel is named.
                assert!(message.contains("p-3"), "message was: {message}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        // Zero assignments created.
        assert!(env
            .store
            .open_parcel_ids(&["p-1".to_string(), "p-3".to_string()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn manual_assignment_missing_parcel_aborts() {
        let env = env();
        env.registry.insert(parcel("p-1", "addr-X"));

        let result = env.orchestrator.create_manual_assignment(
            "shipper-1",
            &["p-1".to_string(), "p-ghost".to_string()],
            None,
        );
        assert!(
            matches!(result, Err(DispatchError::NotFound { ref id, .. }) if id == "p-ghost")
        );
    }

    #[test]
    fn zone_filter_drops_only_parcels_without_coordinates() {
        let env = env();
        env.registry.insert(parcel("p-1", "addr-X"));
        let mut blind = parcel("p-2", "addr-X");
        blind.lat = None;
        blind.lon = None;
        env.registry.insert(blind);

        let zone = Zone {
            id: "zone-1".to_string(),
        };
        let assignment = env
            .orchestrator
            .create_manual_assignment(
                "shipper-1",
                &["p-1".to_string(), "p-2".to_string()],
                Some(&zone),
            )
            .unwrap();

        // The geocoded parcel survives, the blind one is dropped.
        assert_eq!(assignment.parcel_ids(), vec!["p-1"]);
    }

    #[test]
    fn manual_assignment_rejects_double_assignment() {
        let env = env();
        env.registry.insert(parcel("p-1", "addr-X"));
        env.orchestrator
            .create_manual_assignment("shipper-1", &["p-1".to_string()], None)
            .unwrap();

        let result =
            env.orchestrator
                .create_manual_assignment("shipper-2", &["p-1".to_string()], None);
        assert!(matches!(
            result,
            Err(DispatchError::Store(
                couriercore_store::StoreError::ParcelAlreadyAssigned(_)
            ))
        ));
    }

    #[test]
    fn auto_assignment_groups_by_delivery_address() {
        // Solver interleaves two addresses in one route; exactly two
        // assignments come out, one per address, with the right parcels.
        let env = env();
        env.registry.insert(parcel("p-1", "addr-X"));
        env.registry.insert(parcel("p-2", "addr-X"));
        env.registry.insert(parcel("p-3", "addr-Y"));
        env.shippers.insert(profile("s-1"));

        let mut assignments = HashMap::new();
        assignments.insert(
            "s-1".to_string(),
            vec![
                SolvedTask { order_id: "p-1".to_string(), sequence: 0, eta_s: None },
                SolvedTask { order_id: "p-3".to_string(), sequence: 1, eta_s: None },
                SolvedTask { order_id: "p-2".to_string(), sequence: 2, eta_s: None },
            ],
        );
        env.geometry.set_solution(VrpResponse {
            success: true,
            message: None,
            assignments,
            unassigned_orders: vec!["p-9".to_string()],
            statistics: None,
        });

        let outcome = env
            .orchestrator
            .create_auto_assignment(
                &["s-1".to_string()],
                &ParcelSelection::All,
                "CAR",
                SolveMode::Fastest,
            )
            .unwrap();

        assert_eq!(outcome.created.len(), 2);
        let by_address: HashMap<&str, Vec<String>> = outcome
            .created
            .iter()
            .map(|a| (a.delivery_address_id.as_str(), a.parcel_ids()))
            .collect();
        assert_eq!(by_address["addr-X"], vec!["p-1", "p-2"]);
        assert_eq!(by_address["addr-Y"], vec!["p-3"]);

        // Solver-reported unassigned ids pass through unchanged.
        assert_eq!(outcome.unassigned_order_ids, vec!["p-9"]);
        assert_eq!(outcome.summary.shippers_used, 1);
        assert_eq!(outcome.summary.assigned_parcels, 3);
        assert_eq!(outcome.summary.workload_variance, 0.0);
    }

    #[test]
    fn auto_assignment_solver_failure_aborts_with_message() {
        let env = env();
        env.registry.insert(parcel("p-1", "addr-X"));
        env.shippers.insert(profile("s-1"));
        env.geometry.set_solution(VrpResponse {
            success: false,
            message: Some("fleet capacity exhausted".to_string()),
            assignments: HashMap::new(),
            unassigned_orders: vec![],
            statistics: None,
        });

        let result = env.orchestrator.create_auto_assignment(
            &["s-1".to_string()],
            &ParcelSelection::All,
            "CAR",
            SolveMode::Fastest,
        );

        match result {
            Err(DispatchError::Geometry(GeoError::Solver(message))) => {
                assert!(message.contains("fleet capacity exhausted"));
            }
            other => panic!("expected solver failure, got {other:?}"),
        }
        // No partial assignment was left behind.
        assert!(env
            .store
            .open_parcel_ids(&["p-1".to_string()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn auto_assignment_drops_already_assigned_parcels() {
        let env = env();
        env.registry.insert(parcel("p-1", "addr-X"));
        env.registry.insert(parcel("p-2", "addr-Y"));
        env.shippers.insert(profile("s-1"));
        // p-1 is already in an open assignment.
        env.orchestrator
            .create_manual_assignment("shipper-9", &["p-1".to_string()], None)
            .unwrap();

        let outcome = env
            .orchestrator
            .create_auto_assignment(
                &["s-1".to_string()],
                &ParcelSelection::All,
                "CAR",
                SolveMode::Fastest,
            )
            .unwrap();

        // Only p-2 went through the solve (naive solve: first shipper).
        assert_eq!(outcome.summary.total_parcels, 1);
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.created[0].parcel_ids(), vec!["p-2"]);
    }

    #[test]
    fn auto_assignment_requires_candidates_and_shippers() {
        let env = env();
        // No parcels at all.
        let result = env.orchestrator.create_auto_assignment(
            &["s-1".to_string()],
            &ParcelSelection::All,
            "CAR",
            SolveMode::Fastest,
        );
        assert!(matches!(result, Err(DispatchError::Validation(_))));

        // Parcels but no shipper profiles.
        env.registry.insert(parcel("p-1", "addr-X"));
        let result = env.orchestrator.create_auto_assignment(
            &["s-unknown".to_string()],
            &ParcelSelection::All,
            "CAR",
            SolveMode::Fastest,
        );
        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[test]
    fn variance_matches_reference_values() {
        assert_eq!(population_variance(&[2, 2, 2]), 0.0);
        assert_eq!(population_variance(&[1, 3]), 1.0);
        assert_eq!(population_variance(&[]), 0.0);
    }

    proptest! {
        #[test]
        fn variance_is_non_negative(counts in proptest::collection::vec(0usize..100, 0..20)) {
            prop_assert!(population_variance(&counts) >= 0.0);
        }

        #[test]
        fn variance_is_zero_for_uniform_counts(count in 0usize..100, n in 1usize..20) {
            let counts = vec![count; n];
            prop_assert_eq!(population_variance(&counts), 0.0);
        }
    }
}
