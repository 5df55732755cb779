//! Assignment and session state machine
//!
//! Enforces legal transitions and keeps assignment, session, and parcel
//! status consistent. Status checks run twice on write paths: once up front
//! so no collaborator call happens from an illegal state, and once inside
//! the store transaction so concurrent writers resolve to one winner.
//!
//! Parcel-status synchronization always runs before the local status write;
//! a registry failure therefore aborts with the local state untouched. A
//! desync in the other direction (registry updated, local write lost) is
//! surfaced to the caller as a storage error, never swallowed.

use crate::error::{DispatchError, Result};
use chrono::{DateTime, Duration, Utc};
use couriercore_core::time::now;
use couriercore_domain::{
    AssignmentStatus, DeliveryAssignment, DeliverySession, RouteInfo, SessionStatus,
};
use couriercore_registry::{ParcelRecord, ParcelRegistry, ParcelStatusEvent};
use couriercore_store::DeliveryStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on the page size a caller may request.
const MAX_PAGE_SIZE: i64 = 200;

/// One assignment enriched with its parcel details.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    /// The assignment
    pub assignment: DeliveryAssignment,
    /// Parcel details in delivery order
    pub parcels: Vec<ParcelRecord>,
}

/// One page of enriched assignments.
///
/// `dropped` counts assignments omitted because their parcel lookup failed;
/// partial results are returned instead of failing the whole page.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    /// Enriched assignments, most recent scan first
    pub tasks: Vec<TaskView>,
    /// Assignments dropped because parcel details could not be resolved
    pub dropped: usize,
    /// Requested page index
    pub page: u32,
    /// Requested page size
    pub size: u32,
}

/// State machine over the delivery store and the parcel registry.
pub struct SessionLifecycle {
    store: Arc<DeliveryStore>,
    registry: Arc<dyn ParcelRegistry>,
}

impl SessionLifecycle {
    /// Create the state machine over its collaborators.
    pub fn new(store: Arc<DeliveryStore>, registry: Arc<dyn ParcelRegistry>) -> Self {
        Self { store, registry }
    }

    /// Accept an assignment on behalf of its owning shipper.
    ///
    /// Legal only from PENDING or ASSIGNED and only for the owner; records
    /// the scan time. Of two concurrent accepts exactly one wins.
    pub fn accept_assignment(
        &self,
        shipper_id: &str,
        assignment_id: &str,
    ) -> Result<DeliveryAssignment> {
        let accepted = self
            .store
            .accept_assignment(assignment_id, shipper_id, now())?;

        info!(
            assignment_id = assignment_id,
            shipper_id = shipper_id,
            "Assignment accepted"
        );
        Ok(accepted)
    }

    /// Create a CREATED session owning the given assignments in order.
    pub fn create_session(
        &self,
        shipper_id: &str,
        assignment_ids: &[String],
    ) -> Result<DeliverySession> {
        if assignment_ids.is_empty() {
            return Err(DispatchError::Validation(
                "a session requires at least one assignment".to_string(),
            ));
        }

        let session = DeliverySession::new(shipper_id, now());
        self.store.insert_session(&session, assignment_ids)?;

        let created = self
            .store
            .get_session(&session.id)?
            .ok_or_else(|| DispatchError::NotFound {
                entity: "session",
                id: session.id.clone(),
            })?;

        info!(
            session_id = %created.id,
            shipper_id = shipper_id,
            assignments = assignment_ids.len(),
            "Session created"
        );
        Ok(created)
    }

    /// Start a session: every assignment moves ACCEPTED -> IN_PROGRESS and
    /// every parcel is reported picked up to the registry.
    ///
    /// Validate-then-commit: any assignment outside ACCEPTED rejects the
    /// whole start before any mutation, local or remote.
    pub fn start_session(&self, session_id: &str) -> Result<DeliverySession> {
        let session = self
            .store
            .get_session(session_id)?
            .ok_or_else(|| DispatchError::NotFound {
                entity: "session",
                id: session_id.to_string(),
            })?;

        if session.status != SessionStatus::Created {
            return Err(DispatchError::StateConflict(format!(
                "session {session_id} is {} (expected CREATED)",
                session.status.as_str()
            )));
        }

        for assignment in &session.assignments {
            if assignment.status != AssignmentStatus::Accepted {
                return Err(DispatchError::StateConflict(format!(
                    "assignment {} is {} (expected ACCEPTED)",
                    assignment.id,
                    assignment.status.as_str()
                )));
            }
        }

        if let Some(active) = self.store.find_active_session(&session.shipper_id)? {
            return Err(DispatchError::StateConflict(format!(
                "shipper {} already has session {} in progress",
                session.shipper_id, active.id
            )));
        }

        // Remote sync first: a registry failure aborts with local state
        // untouched.
        for assignment in &session.assignments {
            for parcel in &assignment.parcels {
                self.registry
                    .change_parcel_status(&parcel.parcel_id, ParcelStatusEvent::PickedUp)?;
            }
        }

        let started = self.store.start_session(session_id, now())?;

        info!(
            session_id = session_id,
            shipper_id = %started.shipper_id,
            assignments = started.assignments.len(),
            "Session started"
        );
        Ok(started)
    }

    /// Report a successful delivery for one parcel.
    pub fn complete_task(
        &self,
        parcel_id: &str,
        shipper_id: &str,
        route: &RouteInfo,
    ) -> Result<DeliveryAssignment> {
        self.conclude_task(
            parcel_id,
            shipper_id,
            AssignmentStatus::Completed,
            None,
            route,
        )
    }

    /// Report a failed delivery attempt for one parcel.
    pub fn fail_task(
        &self,
        parcel_id: &str,
        shipper_id: &str,
        reason: &str,
        route: &RouteInfo,
    ) -> Result<DeliveryAssignment> {
        self.conclude_task(
            parcel_id,
            shipper_id,
            AssignmentStatus::Failed,
            Some(reason),
            route,
        )
    }

    fn conclude_task(
        &self,
        parcel_id: &str,
        shipper_id: &str,
        outcome: AssignmentStatus,
        fail_reason: Option<&str>,
        route: &RouteInfo,
    ) -> Result<DeliveryAssignment> {
        let session = self
            .store
            .find_active_session(shipper_id)?
            .ok_or_else(|| DispatchError::NotFound {
                entity: "active session for shipper",
                id: shipper_id.to_string(),
            })?;

        let assignment = self
            .store
            .find_assignment_for_parcel(&session.id, parcel_id)?
            .ok_or_else(|| DispatchError::NotFound {
                entity: "assignment for parcel",
                id: parcel_id.to_string(),
            })?;

        if assignment.status != AssignmentStatus::InProgress {
            return Err(DispatchError::StateConflict(format!(
                "assignment {} is {} (expected IN_PROGRESS)",
                assignment.id,
                assignment.status.as_str()
            )));
        }

        let event = match outcome {
            AssignmentStatus::Completed => ParcelStatusEvent::Delivered,
            _ => ParcelStatusEvent::DeliveryFailed,
        };
        // Registry first; its failure leaves the local status untouched.
        self.registry.change_parcel_status(parcel_id, event)?;

        let concluded =
            self.store
                .conclude_assignment(&assignment.id, outcome, fail_reason, route)?;

        info!(
            assignment_id = %concluded.id,
            parcel_id = parcel_id,
            shipper_id = shipper_id,
            outcome = outcome.as_str(),
            "Task concluded"
        );
        Ok(concluded)
    }

    /// Move an IN_PROGRESS session to a terminal status, exactly once.
    ///
    /// The caller releases the session's tracking window after this
    /// succeeds.
    pub fn finish_session(
        &self,
        session_id: &str,
        outcome: SessionStatus,
    ) -> Result<DeliverySession> {
        if !outcome.is_terminal() {
            return Err(DispatchError::Validation(format!(
                "{} is not a terminal session status",
                outcome.as_str()
            )));
        }

        let finished = self.store.finish_session(session_id, outcome, now())?;

        info!(
            session_id = session_id,
            outcome = outcome.as_str(),
            "Session finished"
        );
        Ok(finished)
    }

    /// Today's assignments for a shipper, enriched with parcel details.
    pub fn daily_tasks(
        &self,
        shipper_id: &str,
        statuses: &[AssignmentStatus],
        page: i64,
        size: i64,
    ) -> Result<TaskPage> {
        let today = now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        self.tasks_between(shipper_id, today, today + Duration::days(1), statuses, page, size)
    }

    /// Assignments for a shipper within a time window, enriched with parcel
    /// details, most recent scan first.
    ///
    /// An assignment whose parcel details cannot be resolved is dropped
    /// from the page and counted, not raised.
    pub fn tasks_between(
        &self,
        shipper_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AssignmentStatus],
        page: i64,
        size: i64,
    ) -> Result<TaskPage> {
        if page < 0 || size <= 0 || size > MAX_PAGE_SIZE {
            return Err(DispatchError::Validation(format!(
                "pagination out of bounds: page {page}, size {size}"
            )));
        }

        let all_statuses = [
            AssignmentStatus::Pending,
            AssignmentStatus::Accepted,
            AssignmentStatus::Assigned,
            AssignmentStatus::InProgress,
            AssignmentStatus::Completed,
            AssignmentStatus::Failed,
        ];
        let statuses: &[AssignmentStatus] = if statuses.is_empty() {
            &all_statuses
        } else {
            statuses
        };

        let assignments =
            self.store
                .list_assignments(shipper_id, statuses, from, to, page as u32, size as u32)?;

        let parcel_ids: Vec<String> = assignments
            .iter()
            .flat_map(|a| a.parcel_ids())
            .collect();
        let records: HashMap<String, ParcelRecord> =
            self.registry.fetch_parcels_bulk(&parcel_ids)?;

        let mut tasks = Vec::with_capacity(assignments.len());
        let mut dropped = 0;
        for assignment in assignments {
            let mut parcels = Vec::with_capacity(assignment.parcels.len());
            let mut missing = None;
            for link in &assignment.parcels {
                match records.get(&link.parcel_id) {
                    Some(record) => parcels.push(record.clone()),
                    None => {
                        missing = Some(link.parcel_id.clone());
                        break;
                    }
                }
            }

            match missing {
                Some(parcel_id) => {
                    warn!(
                        assignment_id = %assignment.id,
                        parcel_id = %parcel_id,
                        "Dropping assignment from listing: parcel lookup failed"
                    );
                    dropped += 1;
                }
                None => tasks.push(TaskView { assignment, parcels }),
            }
        }

        Ok(TaskPage {
            tasks,
            dropped,
            page: page as u32,
            size: size as u32,
        })
    }
}
