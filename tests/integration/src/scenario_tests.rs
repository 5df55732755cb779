//! End-to-end scenarios across the orchestrator, state machine, and
//! tracking engine.

use crate::test_utils::{tracking_point, TestEnv, BASE_LAT, BASE_LON, DEG_40_M};
use couriercore_dispatch::{DispatchError, ParcelSelection};
use couriercore_domain::{AssignmentStatus, SessionStatus};
use couriercore_events::TrackingEvent;
use couriercore_geo::{SolveMode, SolvedTask, VrpResponse};
use std::collections::HashMap;

#[test]
fn manual_assignment_with_shared_address_creates_one_pending_assignment() {
    // P1 and P2 share address X -> one PENDING assignment with both parcels.
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    env.seed_parcel("P2", "X");

    let assignment = env
        .orchestrator
        .create_manual_assignment("S1", &["P1".to_string(), "P2".to_string()], None)
        .unwrap();

    assert_eq!(assignment.status, AssignmentStatus::Pending);
    assert_eq!(assignment.delivery_address_id, "X");
    assert_eq!(assignment.parcel_ids(), vec!["P1", "P2"]);
}

#[test]
fn manual_assignment_with_mixed_addresses_names_the_offender() {
    // P1 at X, P3 at Y -> validation error naming P3, nothing created.
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    env.seed_parcel("P3", "Y");

    let result = env.orchestrator.create_manual_assignment(
        "S1",
        &["P1".to_string(), "P3".to_string()],
        None,
    );

    match result {
        Err(DispatchError::Validation(message)) => assert!(message.contains("P3")),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(env
        .store
        .open_parcel_ids(&["P1".to_string(), "P3".to_string()])
        .unwrap()
        .is_empty());
}

#[test]
fn start_session_rejected_when_assignment_never_accepted() {
    // The session's only assignment is still PENDING: the start is rejected
    // and neither aggregate moves.
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    let assignment = env
        .orchestrator
        .create_manual_assignment("S1", &["P1".to_string()], None)
        .unwrap();
    let session = env
        .lifecycle
        .create_session("S1", &[assignment.id.clone()])
        .unwrap();

    let result = env.lifecycle.start_session(&session.id);
    assert!(matches!(result, Err(DispatchError::StateConflict(_))));

    let session = env.store.get_session(&session.id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Created);
    assert_eq!(session.assignments[0].status, AssignmentStatus::Pending);
}

#[test]
fn auto_assignment_splits_interleaved_addresses_per_shipper() {
    // Solver returns S1 -> [P1(X), P2(X), P3(Y)] interleaved; exactly two
    // assignments come out, one per address, with the right parcel subsets.
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    env.seed_parcel("P2", "X");
    env.seed_parcel("P3", "Y");
    env.seed_shipper("S1");

    let mut assignments = HashMap::new();
    assignments.insert(
        "S1".to_string(),
        vec![
            SolvedTask { order_id: "P1".to_string(), sequence: 0, eta_s: None },
            SolvedTask { order_id: "P2".to_string(), sequence: 1, eta_s: None },
            SolvedTask { order_id: "P3".to_string(), sequence: 2, eta_s: None },
        ],
    );
    env.geometry.set_solution(VrpResponse {
        success: true,
        message: None,
        assignments,
        unassigned_orders: vec![],
        statistics: None,
    });

    let outcome = env
        .orchestrator
        .create_auto_assignment(
            &["S1".to_string()],
            &ParcelSelection::All,
            "CAR",
            SolveMode::Fastest,
        )
        .unwrap();

    assert_eq!(outcome.created.len(), 2);
    for assignment in &outcome.created {
        assert_eq!(assignment.shipper_id, "S1");
        match assignment.delivery_address_id.as_str() {
            "X" => assert_eq!(assignment.parcel_ids(), vec!["P1", "P2"]),
            "Y" => assert_eq!(assignment.parcel_ids(), vec!["P3"]),
            other => panic!("unexpected address {other}"),
        }
    }
}

#[test]
fn node_passage_fires_once_then_only_location_updates() {
    // A node 40 m away (threshold 50 m): first sample publishes NODE_PASSED
    // and LOCATION_UPDATE, the identical next sample only LOCATION_UPDATE.
    let env = TestEnv::new();
    env.seed_parcel("P1", "X");
    env.geometry.add_node("node-7", BASE_LAT, BASE_LON);

    let assignment = env
        .orchestrator
        .create_manual_assignment("S1", &["P1".to_string()], None)
        .unwrap();
    let session_id = env.start_session_with("S1", &[assignment.id.clone()]);

    let near = tracking_point(BASE_LAT + DEG_40_M, BASE_LON);
    env.tracking.add_tracking_point(&session_id, &near).unwrap();
    env.tracking.add_tracking_point(&session_id, &near).unwrap();

    let events = env.publisher.events();
    let node_passed: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, TrackingEvent::NodePassed { .. }))
        .collect();
    let updates: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, TrackingEvent::LocationUpdate { .. }))
        .collect();

    assert_eq!(node_passed.len(), 1);
    assert_eq!(updates.len(), 2);
    match node_passed[0] {
        TrackingEvent::NodePassed { node_id, distance_m, .. } => {
            assert_eq!(node_id, "node-7");
            assert!(*distance_m < 50.0);
        }
        _ => unreachable!(),
    }

    // Both samples reached the durable history with the node recorded.
    let history = env.store.samples_for_session(&session_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].nearest_node_id.as_deref(), Some("node-7"));
}
