//! Full delivery-day flows and cross-component invariants.

use crate::test_utils::{tracking_point, TestEnv, BASE_LAT, BASE_LON};
use couriercore_dispatch::{DispatchError, ParcelSelection};
use couriercore_domain::{AssignmentStatus, Coordinate, RouteInfo, SessionStatus};
use couriercore_geo::SolveMode;
use couriercore_registry::ParcelRegistry;
use couriercore_store::StoreError;
use couriercore_tracking::TrackOutcome;
use std::collections::HashSet;

fn route() -> RouteInfo {
    RouteInfo {
        distance_m: 2400.0,
        duration_s: 420.0,
        waypoints: vec![
            Coordinate { lat: BASE_LAT, lon: BASE_LON },
            Coordinate { lat: BASE_LAT + 0.01, lon: BASE_LON },
        ],
    }
}

#[test]
fn a_full_delivery_day() {
    // Assign -> accept -> start -> track -> complete one, fail one ->
    // finish -> the tracking window is released and late samples are
    // ignored.
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    env.seed_parcel("P2", "Y");

    let first = env
        .orchestrator
        .create_manual_assignment("S1", &["P1".to_string()], None)
        .unwrap();
    let second = env
        .orchestrator
        .create_manual_assignment("S1", &["P2".to_string()], None)
        .unwrap();

    let session_id = env.start_session_with("S1", &[first.id.clone(), second.id.clone()]);

    // Session start reported pickups.
    assert_eq!(
        env.registry.fetch_parcel("P1").unwrap().unwrap().status,
        "PICKED_UP"
    );

    // Live tracking runs while the session is active.
    let outcome = env
        .tracking
        .add_tracking_point(&session_id, &tracking_point(BASE_LAT, BASE_LON))
        .unwrap();
    assert!(matches!(outcome, TrackOutcome::Recorded { .. }));

    let completed = env.lifecycle.complete_task("P1", "S1", &route()).unwrap();
    assert_eq!(completed.status, AssignmentStatus::Completed);
    assert_eq!(completed.duration_s, Some(420.0));

    let failed = env
        .lifecycle
        .fail_task("P2", "S1", "receiver absent", &route())
        .unwrap();
    assert_eq!(failed.status, AssignmentStatus::Failed);
    assert_eq!(failed.fail_reason.as_deref(), Some("receiver absent"));
    assert_eq!(
        env.registry.fetch_parcel("P2").unwrap().unwrap().status,
        "DELIVERY_FAILED"
    );

    let finished = env
        .lifecycle
        .finish_session(&session_id, SessionStatus::Completed)
        .unwrap();
    assert_eq!(finished.status, SessionStatus::Completed);
    // The service layer releases the window once the session ends.
    assert!(env.tracking.clear_cache(&session_id));

    // A late sample is accepted but ignored.
    let outcome = env
        .tracking
        .add_tracking_point(&session_id, &tracking_point(BASE_LAT, BASE_LON))
        .unwrap();
    assert_eq!(
        outcome,
        TrackOutcome::Ignored {
            status: SessionStatus::Completed
        }
    );
    assert_eq!(env.tracking.active_windows(), 0);
}

#[test]
fn parcels_stay_disjoint_across_manual_and_auto_modes() {
    // No parcel id may live in two non-terminal assignments, however the
    // assignments were created.
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    env.seed_parcel("P2", "Y");
    env.seed_shipper("S1");

    env.orchestrator
        .create_manual_assignment("S9", &["P1".to_string()], None)
        .unwrap();

    // Manual retry on the same parcel fails.
    let result = env
        .orchestrator
        .create_manual_assignment("S1", &["P1".to_string()], None);
    assert!(matches!(
        result,
        Err(DispatchError::Store(StoreError::ParcelAlreadyAssigned(_)))
    ));

    // The auto round silently skips the taken parcel and places the rest.
    let outcome = env
        .orchestrator
        .create_auto_assignment(
            &["S1".to_string()],
            &ParcelSelection::All,
            "CAR",
            SolveMode::Fastest,
        )
        .unwrap();

    let mut seen = HashSet::new();
    for assignment in &outcome.created {
        for parcel_id in assignment.parcel_ids() {
            assert!(seen.insert(parcel_id.clone()), "parcel {parcel_id} duplicated");
        }
    }
    assert!(seen.contains("P2"));
    assert!(!seen.contains("P1"));
}

#[test]
fn one_active_session_per_shipper_across_the_whole_flow() {
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    env.seed_parcel("P2", "Y");

    let first = env
        .orchestrator
        .create_manual_assignment("S1", &["P1".to_string()], None)
        .unwrap();
    let session_id = env.start_session_with("S1", &[first.id.clone()]);

    // A second session cannot start while the first is running.
    let second = env
        .orchestrator
        .create_manual_assignment("S1", &["P2".to_string()], None)
        .unwrap();
    env.lifecycle.accept_assignment("S1", &second.id).unwrap();
    let blocked = env
        .lifecycle
        .create_session("S1", &[second.id.clone()])
        .unwrap();
    let result = env.lifecycle.start_session(&blocked.id);
    assert!(matches!(result, Err(DispatchError::StateConflict(_))));

    // Finishing the first unblocks the second.
    env.lifecycle
        .finish_session(&session_id, SessionStatus::Completed)
        .unwrap();
    env.tracking.clear_cache(&session_id);
    let started = env.lifecycle.start_session(&blocked.id).unwrap();
    assert_eq!(started.status, SessionStatus::InProgress);
}

#[test]
fn task_listing_reflects_scan_recency_and_enrichment() {
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    env.seed_parcel("P2", "Y");

    let first = env
        .orchestrator
        .create_manual_assignment("S1", &["P1".to_string()], None)
        .unwrap();
    let second = env
        .orchestrator
        .create_manual_assignment("S1", &["P2".to_string()], None)
        .unwrap();
    env.lifecycle.accept_assignment("S1", &first.id).unwrap();
    // Distinct scan timestamps make the recency ordering deterministic.
    std::thread::sleep(std::time::Duration::from_millis(5));
    env.lifecycle.accept_assignment("S1", &second.id).unwrap();

    let page = env.lifecycle.daily_tasks("S1", &[], 0, 10).unwrap();
    assert_eq!(page.tasks.len(), 2);
    assert_eq!(page.dropped, 0);
    // Most recently scanned first.
    assert_eq!(page.tasks[0].assignment.id, second.id);
    // Enrichment carries the parcel details.
    assert_eq!(page.tasks[0].parcels[0].receiver_address_id, "Y");
}
