//! Assignment and session coordination
//!
//! Two tightly coupled services: the lifecycle state machine that drives a
//! shipper's work from assignment acceptance through session completion, and
//! the orchestrator that turns a pool of unassigned parcels and available
//! shippers into assignments, optionally via the external VRP solver.

pub mod error;
pub mod lifecycle;
pub mod orchestrator;

pub use error::{DispatchError, Result};
pub use lifecycle::{SessionLifecycle, TaskPage, TaskView};
pub use orchestrator::{
    AssignmentOrchestrator, AutoAssignOutcome, ParcelSelection, WorkloadSummary, Zone,
};
