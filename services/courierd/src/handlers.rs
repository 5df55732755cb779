use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{TimeZone, Utc};
use couriercore_core::ErrorKind;
use couriercore_dispatch::{DispatchError, ParcelSelection, Zone};
use couriercore_domain::{Coordinate, RouteInfo, SessionStatus};
use couriercore_geo::{GeoError, RouteGeometry, SolveMode};
use couriercore_tracking::{TrackError, TrackOutcome, TrackingPoint};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

trait ApiError: std::fmt::Display {
    fn kind(&self) -> ErrorKind;
}

impl ApiError for DispatchError {
    fn kind(&self) -> ErrorKind {
        DispatchError::kind(self)
    }
}

impl ApiError for TrackError {
    fn kind(&self) -> ErrorKind {
        TrackError::kind(self)
    }
}

impl ApiError for GeoError {
    fn kind(&self) -> ErrorKind {
        GeoError::kind(self)
    }
}

fn error_response(kind: ErrorKind, message: String) -> Response {
    let status = match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::StateConflict => StatusCode::CONFLICT,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            kind: kind.as_str(),
            message,
        }),
    )
        .into_response()
}

/// Run a blocking core operation off the async runtime and shape the
/// result as an HTTP response.
async fn run<T, E, F>(task: F) -> Response
where
    T: Serialize + Send + 'static,
    E: ApiError + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(Ok(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(Err(e)) => error_response(e.kind(), e.to_string()),
        Err(e) => error_response(ErrorKind::Storage, format!("task panicked: {e}")),
    }
}

// ---------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ManualAssignmentBody {
    shipper_id: String,
    parcel_ids: Vec<String>,
    zone_id: Option<String>,
}

pub async fn create_manual_assignment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ManualAssignmentBody>,
) -> Response {
    run(move || {
        let zone = body.zone_id.map(|id| Zone { id });
        state
            .orchestrator
            .create_manual_assignment(&body.shipper_id, &body.parcel_ids, zone.as_ref())
    })
    .await
}

#[derive(Deserialize)]
pub struct AutoAssignmentBody {
    shipper_ids: Vec<String>,
    /// Explicit candidate parcels; absent means "all unassigned".
    parcel_ids: Option<Vec<String>>,
    vehicle: String,
    #[serde(default)]
    mode: SolveMode,
}

pub async fn create_auto_assignment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AutoAssignmentBody>,
) -> Response {
    run(move || {
        let selection = match body.parcel_ids {
            Some(ids) => ParcelSelection::Ids(ids),
            None => ParcelSelection::All,
        };
        state.orchestrator.create_auto_assignment(
            &body.shipper_ids,
            &selection,
            &body.vehicle,
            body.mode,
        )
    })
    .await
}

#[derive(Deserialize)]
pub struct AcceptBody {
    shipper_id: String,
}

pub async fn accept_assignment(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<String>,
    Json(body): Json<AcceptBody>,
) -> Response {
    run(move || {
        state
            .lifecycle
            .accept_assignment(&body.shipper_id, &assignment_id)
    })
    .await
}

// ---------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateSessionBody {
    shipper_id: String,
    assignment_ids: Vec<String>,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionBody>,
) -> Response {
    run(move || {
        state
            .lifecycle
            .create_session(&body.shipper_id, &body.assignment_ids)
    })
    .await
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    run(move || state.lifecycle.start_session(&session_id)).await
}

#[derive(Deserialize)]
pub struct FinishSessionBody {
    outcome: SessionStatus,
}

pub async fn finish_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<FinishSessionBody>,
) -> Response {
    run(move || {
        let finished = state.lifecycle.finish_session(&session_id, body.outcome)?;
        // The session left IN_PROGRESS; its tracking window is done.
        state.tracking.clear_cache(&session_id);
        Ok::<_, DispatchError>(finished)
    })
    .await
}

// ---------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CompleteTaskBody {
    shipper_id: String,
    route: RouteInfo,
}

pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Path(parcel_id): Path<String>,
    Json(body): Json<CompleteTaskBody>,
) -> Response {
    run(move || {
        state
            .lifecycle
            .complete_task(&parcel_id, &body.shipper_id, &body.route)
    })
    .await
}

#[derive(Deserialize)]
pub struct FailTaskBody {
    shipper_id: String,
    reason: String,
    route: RouteInfo,
}

pub async fn fail_task(
    State(state): State<Arc<AppState>>,
    Path(parcel_id): Path<String>,
    Json(body): Json<FailTaskBody>,
) -> Response {
    run(move || {
        state
            .lifecycle
            .fail_task(&parcel_id, &body.shipper_id, &body.reason, &body.route)
    })
    .await
}

#[derive(Deserialize)]
pub struct TaskQuery {
    #[serde(default)]
    page: i64,
    #[serde(default = "default_page_size")]
    size: i64,
    /// Comma-separated status labels; absent means all statuses.
    status: Option<String>,
    /// Window start, epoch milliseconds (ranged listing only).
    from_ms: Option<i64>,
    /// Window end, epoch milliseconds (ranged listing only).
    to_ms: Option<i64>,
}

fn default_page_size() -> i64 {
    20
}

fn parse_statuses(raw: Option<&str>) -> Result<Vec<couriercore_domain::AssignmentStatus>, DispatchError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|label| {
            couriercore_domain::AssignmentStatus::parse(label.trim())
                .map_err(|e| DispatchError::Validation(e.to_string()))
        })
        .collect()
}

pub async fn daily_tasks(
    State(state): State<Arc<AppState>>,
    Path(shipper_id): Path<String>,
    Query(query): Query<TaskQuery>,
) -> Response {
    run(move || {
        let statuses = parse_statuses(query.status.as_deref())?;
        state
            .lifecycle
            .daily_tasks(&shipper_id, &statuses, query.page, query.size)
    })
    .await
}

pub async fn tasks_between(
    State(state): State<Arc<AppState>>,
    Path(shipper_id): Path<String>,
    Query(query): Query<TaskQuery>,
) -> Response {
    run(move || {
        let statuses = parse_statuses(query.status.as_deref())?;
        let from = query
            .from_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| DispatchError::Validation("from_ms is required".to_string()))?;
        let to = query
            .to_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| DispatchError::Validation("to_ms is required".to_string()))?;
        state
            .lifecycle
            .tasks_between(&shipper_id, from, to, &statuses, query.page, query.size)
    })
    .await
}

// ---------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------

#[derive(Serialize)]
pub struct TrackResponse {
    ignored: bool,
    session_status: Option<String>,
    nearest_node_id: Option<String>,
    node_passed: bool,
}

pub async fn add_tracking_point(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(point): Json<TrackingPoint>,
) -> Response {
    run(move || {
        let outcome = state.tracking.add_tracking_point(&session_id, &point)?;
        let response = match outcome {
            TrackOutcome::Ignored { status } => TrackResponse {
                ignored: true,
                session_status: Some(status.as_str().to_string()),
                nearest_node_id: None,
                node_passed: false,
            },
            TrackOutcome::Recorded {
                nearest_node,
                node_passed,
            } => TrackResponse {
                ignored: false,
                session_status: None,
                nearest_node_id: nearest_node.map(|n| n.node_id),
                node_passed,
            },
        };
        Ok::<_, TrackError>(response)
    })
    .await
}

// ---------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ComputeRouteBody {
    waypoints: Vec<Coordinate>,
}

/// Compute distance/duration/geometry for an ordered waypoint list, e.g.
/// to build the `RouteInfo` reported with a task outcome.
pub async fn compute_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ComputeRouteBody>,
) -> Response {
    run(move || state.geometry.compute_route(&body.waypoints)).await
}

// ---------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    active_tracking_windows: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            active_tracking_windows: state.tracking.active_windows(),
        }),
    )
        .into_response()
}
