//! Delivery store - SQLite-backed aggregate storage
//!
//! Sessions, assignments, parcel links, and location samples are persisted
//! with:
//! - SQLite backend with WAL mode for durability
//! - One transaction per aggregate mutation (read-validate-write)
//! - Store-enforced invariants: no parcel in two open assignments, no second
//!   IN_PROGRESS session per shipper, no revisited terminal status
//!
//! The connection sits behind a mutex so the store is `Send + Sync`; SQL
//! conditional checks inside each transaction carry the conflict detection
//! for writers arriving through other handles.

use crate::error::{Result, StoreError};
use chrono::{DateTime, TimeZone, Utc};
use couriercore_core::time::to_epoch_ms;
use couriercore_domain::{
    AssignmentParcel, AssignmentStatus, DeliveryAssignment, DeliverySession, LocationSample,
    RouteInfo, SessionStatus,
};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// SQLite-backed store for delivery aggregates.
pub struct DeliveryStore {
    conn: Mutex<Connection>,
}

impl DeliveryStore {
    /// Create or open a store at the specified path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        info!(path = %path.display(), "Opening delivery store");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store; used by tests and local development.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                shipper_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at INTEGER,
                ended_at INTEGER,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_shipper_status
                ON sessions(shipper_id, status);

            CREATE TABLE IF NOT EXISTS assignments (
                id TEXT PRIMARY KEY,
                shipper_id TEXT NOT NULL,
                delivery_address_id TEXT NOT NULL,
                status TEXT NOT NULL,
                session_id TEXT REFERENCES sessions(id),
                session_position INTEGER,
                assigned_at INTEGER,
                scanned_at INTEGER,
                fail_reason TEXT,
                distance_m REAL,
                duration_s REAL,
                waypoints TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_assignments_shipper
                ON assignments(shipper_id, status);
            CREATE INDEX IF NOT EXISTS idx_assignments_session
                ON assignments(session_id);

            CREATE TABLE IF NOT EXISTS assignment_parcels (
                assignment_id TEXT NOT NULL REFERENCES assignments(id),
                parcel_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (assignment_id, parcel_id)
            );

            CREATE INDEX IF NOT EXISTS idx_assignment_parcels_parcel
                ON assignment_parcels(parcel_id);

            CREATE TABLE IF NOT EXISTS location_samples (
                seq_no INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                shipper_id TEXT NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                recorded_at INTEGER NOT NULL,
                accuracy_m REAL,
                speed_mps REAL,
                nearest_node_id TEXT,
                distance_to_node_m REAL
            );

            CREATE INDEX IF NOT EXISTS idx_samples_session
                ON location_samples(session_id);
            "#,
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Assignments
    // ------------------------------------------------------------------

    /// Persist a new assignment with its parcel links.
    ///
    /// Fails with [`StoreError::ParcelAlreadyAssigned`] when any linked
    /// parcel already belongs to a non-terminal assignment; the check and
    /// the insert run in one transaction.
    pub fn insert_assignment(&self, assignment: &DeliveryAssignment) -> Result<()> {
        let mut conn = self.conn.lock().expect("store connection poisoned");
        let tx = conn.transaction()?;

        for parcel in &assignment.parcels {
            if parcel_in_open_assignment(&tx, &parcel.parcel_id)? {
                return Err(StoreError::ParcelAlreadyAssigned(parcel.parcel_id.clone()));
            }
        }

        tx.execute(
            r#"INSERT INTO assignments
               (id, shipper_id, delivery_address_id, status, session_id,
                session_position, assigned_at, scanned_at, fail_reason,
                distance_m, duration_s, waypoints)
               VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                assignment.id,
                assignment.shipper_id,
                assignment.delivery_address_id,
                assignment.status.as_str(),
                assignment.session_id,
                assignment.assigned_at.map(to_epoch_ms),
                assignment.scanned_at.map(to_epoch_ms),
                assignment.fail_reason,
                assignment.distance_m,
                assignment.duration_s,
                assignment.waypoints,
            ],
        )?;

        for parcel in &assignment.parcels {
            tx.execute(
                "INSERT INTO assignment_parcels (assignment_id, parcel_id, position)
                 VALUES (?1, ?2, ?3)",
                params![assignment.id, parcel.parcel_id, parcel.position],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Load one assignment with its parcel links.
    pub fn get_assignment(&self, id: &str) -> Result<Option<DeliveryAssignment>> {
        let conn = self.conn.lock().expect("store connection poisoned");
        read_assignment(&conn, id)
    }

    /// Accept an assignment on behalf of a shipper.
    ///
    /// Read-validate-write in one transaction: the assignment must exist,
    /// belong to the caller, and be in an accept-legal status. Exactly one
    /// of two concurrent accepts wins; the other receives
    /// [`StoreError::IllegalTransition`].
    pub fn accept_assignment(
        &self,
        assignment_id: &str,
        shipper_id: &str,
        scanned_at: DateTime<Utc>,
    ) -> Result<DeliveryAssignment> {
        let mut conn = self.conn.lock().expect("store connection poisoned");
        let tx = conn.transaction()?;

        let assignment = read_assignment(&tx, assignment_id)?
            .ok_or_else(|| StoreError::AssignmentNotFound(assignment_id.to_string()))?;

        if assignment.shipper_id != shipper_id {
            return Err(StoreError::WrongOwner {
                assignment_id: assignment_id.to_string(),
                owner: assignment.shipper_id,
                caller: shipper_id.to_string(),
            });
        }

        if !assignment.status.accept_allowed() {
            return Err(StoreError::IllegalTransition {
                entity: "assignment",
                id: assignment_id.to_string(),
                from: assignment.status.as_str().to_string(),
                to: AssignmentStatus::Accepted.as_str().to_string(),
            });
        }

        tx.execute(
            "UPDATE assignments SET status = ?1, scanned_at = ?2 WHERE id = ?3",
            params![
                AssignmentStatus::Accepted.as_str(),
                to_epoch_ms(scanned_at),
                assignment_id
            ],
        )?;

        let updated = read_assignment(&tx, assignment_id)?
            .ok_or_else(|| StoreError::AssignmentNotFound(assignment_id.to_string()))?;
        tx.commit()?;
        Ok(updated)
    }

    /// Conclude an assignment with a terminal status and its route outcome.
    ///
    /// The assignment must currently be IN_PROGRESS; terminal statuses are
    /// written exactly once.
    pub fn conclude_assignment(
        &self,
        assignment_id: &str,
        outcome: AssignmentStatus,
        fail_reason: Option<&str>,
        route: &RouteInfo,
    ) -> Result<DeliveryAssignment> {
        debug_assert!(outcome.is_terminal());

        let mut conn = self.conn.lock().expect("store connection poisoned");
        let tx = conn.transaction()?;

        let assignment = read_assignment(&tx, assignment_id)?
            .ok_or_else(|| StoreError::AssignmentNotFound(assignment_id.to_string()))?;

        if assignment.status != AssignmentStatus::InProgress {
            return Err(StoreError::IllegalTransition {
                entity: "assignment",
                id: assignment_id.to_string(),
                from: assignment.status.as_str().to_string(),
                to: outcome.as_str().to_string(),
            });
        }

        tx.execute(
            r#"UPDATE assignments
               SET status = ?1, fail_reason = ?2, distance_m = ?3,
                   duration_s = ?4, waypoints = ?5
               WHERE id = ?6"#,
            params![
                outcome.as_str(),
                fail_reason,
                route.distance_m,
                route.duration_s,
                route.waypoints_json(),
                assignment_id
            ],
        )?;

        let updated = read_assignment(&tx, assignment_id)?
            .ok_or_else(|| StoreError::AssignmentNotFound(assignment_id.to_string()))?;
        tx.commit()?;
        Ok(updated)
    }

    /// Assignments for a shipper filtered by status set and time window,
    /// most recent scan first.
    ///
    /// The window and the ordering use the scan time, falling back to the
    /// assignment time for never-scanned assignments.
    pub fn list_assignments(
        &self,
        shipper_id: &str,
        statuses: &[AssignmentStatus],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: u32,
        size: u32,
    ) -> Result<Vec<DeliveryAssignment>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().expect("store connection poisoned");

        let status_labels: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let placeholders = vec!["?"; status_labels.len()].join(", ");
        let sql = format!(
            r#"SELECT id FROM assignments
               WHERE shipper_id = ?
                 AND status IN ({placeholders})
                 AND COALESCE(scanned_at, assigned_at) >= ?
                 AND COALESCE(scanned_at, assigned_at) < ?
               ORDER BY COALESCE(scanned_at, assigned_at) DESC
               LIMIT ? OFFSET ?"#,
        );

        let mut values: Vec<rusqlite::types::Value> =
            vec![rusqlite::types::Value::Text(shipper_id.to_string())];
        for label in &status_labels {
            values.push(rusqlite::types::Value::Text((*label).to_string()));
        }
        values.push(rusqlite::types::Value::Integer(to_epoch_ms(from)));
        values.push(rusqlite::types::Value::Integer(to_epoch_ms(to)));
        values.push(rusqlite::types::Value::Integer(i64::from(size)));
        values.push(rusqlite::types::Value::Integer(
            i64::from(page) * i64::from(size),
        ));

        let mut stmt = conn.prepare(&sql)?;
        let ids: Vec<String> = stmt
            .query_map(rusqlite::params_from_iter(values), |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut assignments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(assignment) = read_assignment(&conn, &id)? {
                assignments.push(assignment);
            }
        }
        Ok(assignments)
    }

    /// Among `candidates`, the parcel ids already linked to a non-terminal
    /// assignment.
    pub fn open_parcel_ids(&self, candidates: &[String]) -> Result<HashSet<String>> {
        let conn = self.conn.lock().expect("store connection poisoned");
        let mut stmt = conn.prepare(
            r#"SELECT DISTINCT ap.parcel_id
               FROM assignment_parcels ap
               JOIN assignments a ON a.id = ap.assignment_id
               WHERE a.status NOT IN ('COMPLETED', 'FAILED')"#,
        )?;
        let open: HashSet<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<_>>()?;

        Ok(candidates
            .iter()
            .filter(|id| open.contains(*id))
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Persist a new CREATED session and bind the given assignments to it
    /// in order.
    ///
    /// Every assignment must exist, belong to the session's shipper, and
    /// not already be bound to a session.
    pub fn insert_session(
        &self,
        session: &DeliverySession,
        assignment_ids: &[String],
    ) -> Result<()> {
        let mut conn = self.conn.lock().expect("store connection poisoned");
        let tx = conn.transaction()?;

        for assignment_id in assignment_ids {
            let assignment = read_assignment(&tx, assignment_id)?
                .ok_or_else(|| StoreError::AssignmentNotFound(assignment_id.clone()))?;
            if assignment.shipper_id != session.shipper_id {
                return Err(StoreError::WrongOwner {
                    assignment_id: assignment_id.clone(),
                    owner: assignment.shipper_id,
                    caller: session.shipper_id.clone(),
                });
            }
            if assignment.session_id.is_some() {
                return Err(StoreError::AssignmentAlreadyBound(assignment_id.clone()));
            }
        }

        tx.execute(
            r#"INSERT INTO sessions (id, shipper_id, status, started_at, ended_at, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                session.id,
                session.shipper_id,
                session.status.as_str(),
                session.started_at.map(to_epoch_ms),
                session.ended_at.map(to_epoch_ms),
                to_epoch_ms(session.created_at),
            ],
        )?;

        for (position, assignment_id) in assignment_ids.iter().enumerate() {
            tx.execute(
                "UPDATE assignments SET session_id = ?1, session_position = ?2 WHERE id = ?3",
                params![session.id, position as i64, assignment_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Load one session with its assignments in working order.
    pub fn get_session(&self, id: &str) -> Result<Option<DeliverySession>> {
        let conn = self.conn.lock().expect("store connection poisoned");
        read_session(&conn, id)
    }

    /// The shipper's single IN_PROGRESS session, if any.
    pub fn find_active_session(&self, shipper_id: &str) -> Result<Option<DeliverySession>> {
        let conn = self.conn.lock().expect("store connection poisoned");
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM sessions WHERE shipper_id = ?1 AND status = 'IN_PROGRESS'
                 ORDER BY created_at DESC LIMIT 1",
                params![shipper_id],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) => read_session(&conn, &id),
            None => Ok(None),
        }
    }

    /// Start a CREATED session: every bound assignment moves to
    /// IN_PROGRESS and the session records its start time.
    ///
    /// The whole transition is one transaction; it re-validates that the
    /// session is still CREATED, that no other session is already running
    /// for the shipper, and that every assignment is still ACCEPTED.
    pub fn start_session(
        &self,
        session_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<DeliverySession> {
        let mut conn = self.conn.lock().expect("store connection poisoned");
        let tx = conn.transaction()?;

        let session = read_session(&tx, session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        if session.status != SessionStatus::Created {
            return Err(StoreError::IllegalTransition {
                entity: "session",
                id: session_id.to_string(),
                from: session.status.as_str().to_string(),
                to: SessionStatus::InProgress.as_str().to_string(),
            });
        }

        let running: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sessions WHERE shipper_id = ?1 AND status = 'IN_PROGRESS'",
            params![session.shipper_id],
            |row| row.get(0),
        )?;
        if running > 0 {
            return Err(StoreError::ActiveSessionExists(session.shipper_id.clone()));
        }

        for assignment in &session.assignments {
            if assignment.status != AssignmentStatus::Accepted {
                return Err(StoreError::AssignmentNotAccepted {
                    assignment_id: assignment.id.clone(),
                    status: assignment.status.as_str().to_string(),
                });
            }
        }

        tx.execute(
            "UPDATE assignments SET status = ?1 WHERE session_id = ?2",
            params![AssignmentStatus::InProgress.as_str(), session_id],
        )?;
        tx.execute(
            "UPDATE sessions SET status = ?1, started_at = ?2 WHERE id = ?3",
            params![
                SessionStatus::InProgress.as_str(),
                to_epoch_ms(started_at),
                session_id
            ],
        )?;

        let updated = read_session(&tx, session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        tx.commit()?;
        Ok(updated)
    }

    /// Move an IN_PROGRESS session to a terminal status, exactly once.
    pub fn finish_session(
        &self,
        session_id: &str,
        outcome: SessionStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<DeliverySession> {
        debug_assert!(outcome.is_terminal());

        let mut conn = self.conn.lock().expect("store connection poisoned");
        let tx = conn.transaction()?;

        let session = read_session(&tx, session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        if session.status != SessionStatus::InProgress {
            return Err(StoreError::IllegalTransition {
                entity: "session",
                id: session_id.to_string(),
                from: session.status.as_str().to_string(),
                to: outcome.as_str().to_string(),
            });
        }

        tx.execute(
            "UPDATE sessions SET status = ?1, ended_at = ?2 WHERE id = ?3",
            params![outcome.as_str(), to_epoch_ms(ended_at), session_id],
        )?;

        let updated = read_session(&tx, session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        tx.commit()?;
        Ok(updated)
    }

    /// The session an IN_PROGRESS assignment for this parcel belongs to,
    /// within the given session.
    pub fn find_assignment_for_parcel(
        &self,
        session_id: &str,
        parcel_id: &str,
    ) -> Result<Option<DeliveryAssignment>> {
        let conn = self.conn.lock().expect("store connection poisoned");
        let id: Option<String> = conn
            .query_row(
                r#"SELECT a.id FROM assignments a
                   JOIN assignment_parcels ap ON ap.assignment_id = a.id
                   WHERE a.session_id = ?1 AND ap.parcel_id = ?2"#,
                params![session_id, parcel_id],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) => read_assignment(&conn, &id),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Location samples
    // ------------------------------------------------------------------

    /// Append one location sample to the durable history.
    pub fn insert_sample(&self, sample: &LocationSample) -> Result<()> {
        let conn = self.conn.lock().expect("store connection poisoned");
        conn.execute(
            r#"INSERT INTO location_samples
               (session_id, shipper_id, lat, lon, recorded_at, accuracy_m,
                speed_mps, nearest_node_id, distance_to_node_m)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                sample.session_id,
                sample.shipper_id,
                sample.lat,
                sample.lon,
                to_epoch_ms(sample.recorded_at),
                sample.accuracy_m,
                sample.speed_mps,
                sample.nearest_node_id,
                sample.distance_to_node_m,
            ],
        )?;
        Ok(())
    }

    /// All samples for a session in insertion order.
    pub fn samples_for_session(&self, session_id: &str) -> Result<Vec<LocationSample>> {
        let conn = self.conn.lock().expect("store connection poisoned");
        let mut stmt = conn.prepare(
            r#"SELECT session_id, shipper_id, lat, lon, recorded_at, accuracy_m,
                      speed_mps, nearest_node_id, distance_to_node_m
               FROM location_samples WHERE session_id = ?1 ORDER BY seq_no"#,
        )?;

        let rows: Vec<(String, String, f64, f64, i64, Option<f64>, Option<f64>, Option<String>, Option<f64>)> =
            stmt.query_map(params![session_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        rows.into_iter()
            .map(|(session_id, shipper_id, lat, lon, recorded_ms, accuracy_m, speed_mps, nearest_node_id, distance_to_node_m)| {
                Ok(LocationSample {
                    session_id,
                    shipper_id,
                    lat,
                    lon,
                    recorded_at: ms_to_dt(recorded_ms)?,
                    accuracy_m,
                    speed_mps,
                    nearest_node_id,
                    distance_to_node_m,
                })
            })
            .collect()
    }
}

// ----------------------------------------------------------------------
// Row mapping helpers (shared by plain connections and transactions)
// ----------------------------------------------------------------------

fn ms_to_dt(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::CorruptRow(format!("timestamp {ms} out of range")))
}

fn parcel_in_open_assignment(conn: &Connection, parcel_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        r#"SELECT EXISTS(
               SELECT 1 FROM assignment_parcels ap
               JOIN assignments a ON a.id = ap.assignment_id
               WHERE ap.parcel_id = ?1
                 AND a.status NOT IN ('COMPLETED', 'FAILED'))"#,
        params![parcel_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

type AssignmentRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<f64>,
    Option<f64>,
    Option<String>,
);

fn read_assignment(conn: &Connection, id: &str) -> Result<Option<DeliveryAssignment>> {
    let row: Option<AssignmentRow> = conn
        .query_row(
            r#"SELECT id, shipper_id, delivery_address_id, status, session_id,
                      assigned_at, scanned_at, fail_reason, distance_m,
                      duration_s, waypoints
               FROM assignments WHERE id = ?1"#,
            params![id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            },
        )
        .optional()?;

    let Some((
        id,
        shipper_id,
        delivery_address_id,
        status_label,
        session_id,
        assigned_ms,
        scanned_ms,
        fail_reason,
        distance_m,
        duration_s,
        waypoints,
    )) = row
    else {
        return Ok(None);
    };

    let status = AssignmentStatus::parse(&status_label)
        .map_err(|e| StoreError::CorruptRow(e.to_string()))?;

    let parcels = read_parcels(conn, &id)?;

    Ok(Some(DeliveryAssignment {
        id,
        shipper_id,
        delivery_address_id,
        status,
        session_id,
        assigned_at: assigned_ms.map(ms_to_dt).transpose()?,
        scanned_at: scanned_ms.map(ms_to_dt).transpose()?,
        fail_reason,
        distance_m,
        duration_s,
        waypoints,
        parcels,
    }))
}

fn read_parcels(conn: &Connection, assignment_id: &str) -> Result<Vec<AssignmentParcel>> {
    let mut stmt = conn.prepare(
        "SELECT parcel_id, position FROM assignment_parcels
         WHERE assignment_id = ?1 ORDER BY position",
    )?;
    let parcels = stmt
        .query_map(params![assignment_id], |row| {
            Ok(AssignmentParcel {
                parcel_id: row.get(0)?,
                position: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;
    Ok(parcels)
}

fn read_session(conn: &Connection, id: &str) -> Result<Option<DeliverySession>> {
    let row: Option<(String, String, String, Option<i64>, Option<i64>, i64)> = conn
        .query_row(
            "SELECT id, shipper_id, status, started_at, ended_at, created_at
             FROM sessions WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, shipper_id, status_label, started_ms, ended_ms, created_ms)) = row else {
        return Ok(None);
    };

    let status =
        SessionStatus::parse(&status_label).map_err(|e| StoreError::CorruptRow(e.to_string()))?;

    let mut stmt = conn.prepare(
        "SELECT id FROM assignments WHERE session_id = ?1 ORDER BY session_position",
    )?;
    let assignment_ids: Vec<String> = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut assignments = Vec::with_capacity(assignment_ids.len());
    for assignment_id in assignment_ids {
        if let Some(assignment) = read_assignment(conn, &assignment_id)? {
            assignments.push(assignment);
        }
    }

    Ok(Some(DeliverySession {
        id,
        shipper_id,
        status,
        started_at: started_ms.map(ms_to_dt).transpose()?,
        ended_at: ended_ms.map(ms_to_dt).transpose()?,
        created_at: ms_to_dt(created_ms)?,
        assignments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use couriercore_core::time::now;
    use couriercore_domain::Coordinate;

    fn test_assignment(shipper: &str, address: &str, parcels: &[&str]) -> DeliveryAssignment {
        let ids: Vec<String> = parcels.iter().map(|p| (*p).to_string()).collect();
        DeliveryAssignment::new(shipper, address, &ids, now())
    }

    fn test_route() -> RouteInfo {
        RouteInfo {
            distance_m: 900.0,
            duration_s: 120.0,
            waypoints: vec![Coordinate { lat: 52.0, lon: 13.0 }],
        }
    }

    /// Accept the assignment and bind it into a started session.
    fn drive_to_in_progress(store: &DeliveryStore, assignment: &DeliveryAssignment) -> String {
        store
            .accept_assignment(&assignment.id, &assignment.shipper_id, now())
            .unwrap();
        let session = DeliverySession::new(assignment.shipper_id.clone(), now());
        store
            .insert_session(&session, &[assignment.id.clone()])
            .unwrap();
        store.start_session(&session.id, now()).unwrap();
        session.id
    }

    #[test]
    fn insert_and_get_assignment_roundtrip() {
        let store = DeliveryStore::open_in_memory().unwrap();
        let assignment = test_assignment("shipper-1", "addr-X", &["p-1", "p-2"]);
        store.insert_assignment(&assignment).unwrap();

        let loaded = store.get_assignment(&assignment.id).unwrap().unwrap();
        assert_eq!(loaded.delivery_address_id, "addr-X");
        assert_eq!(loaded.status, AssignmentStatus::Pending);
        assert_eq!(loaded.parcel_ids(), vec!["p-1", "p-2"]);
    }

    #[test]
    fn double_assignment_rejected_while_open() {
        let store = DeliveryStore::open_in_memory().unwrap();
        store
            .insert_assignment(&test_assignment("shipper-1", "addr-X", &["p-1"]))
            .unwrap();

        let second = test_assignment("shipper-2", "addr-Y", &["p-1"]);
        let result = store.insert_assignment(&second);
        assert!(matches!(result, Err(StoreError::ParcelAlreadyAssigned(id)) if id == "p-1"));
        // The rejected transaction left nothing behind.
        assert!(store.get_assignment(&second.id).unwrap().is_none());
    }

    #[test]
    fn parcel_reusable_after_terminal_assignment() {
        let store = DeliveryStore::open_in_memory().unwrap();
        let first = test_assignment("shipper-1", "addr-X", &["p-1"]);
        store.insert_assignment(&first).unwrap();
        drive_to_in_progress(&store, &first);
        store
            .conclude_assignment(&first.id, AssignmentStatus::Completed, None, &test_route())
            .unwrap();

        let second = test_assignment("shipper-2", "addr-X", &["p-1"]);
        assert!(store.insert_assignment(&second).is_ok());
    }

    #[test]
    fn accept_requires_owner_and_legal_status() {
        let store = DeliveryStore::open_in_memory().unwrap();
        let assignment = test_assignment("shipper-1", "addr-X", &["p-1"]);
        store.insert_assignment(&assignment).unwrap();

        let wrong_owner = store.accept_assignment(&assignment.id, "shipper-2", now());
        assert!(matches!(wrong_owner, Err(StoreError::WrongOwner { .. })));

        let accepted = store
            .accept_assignment(&assignment.id, "shipper-1", now())
            .unwrap();
        assert_eq!(accepted.status, AssignmentStatus::Accepted);
        assert!(accepted.scanned_at.is_some());

        // Second accept loses: the status moved out of the legal source set.
        let again = store.accept_assignment(&assignment.id, "shipper-1", now());
        assert!(matches!(again, Err(StoreError::IllegalTransition { .. })));
    }

    #[test]
    fn start_session_requires_all_accepted() {
        let store = DeliveryStore::open_in_memory().unwrap();
        let assignment = test_assignment("shipper-1", "addr-X", &["p-1"]);
        store.insert_assignment(&assignment).unwrap();

        let session = DeliverySession::new("shipper-1", now());
        store
            .insert_session(&session, &[assignment.id.clone()])
            .unwrap();

        // Assignment still PENDING: the start is rejected and nothing moves.
        let result = store.start_session(&session.id, now());
        assert!(matches!(result, Err(StoreError::AssignmentNotAccepted { .. })));
        let reloaded = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(reloaded.status, SessionStatus::Created);
        assert_eq!(reloaded.assignments[0].status, AssignmentStatus::Pending);
    }

    #[test]
    fn single_active_session_per_shipper() {
        let store = DeliveryStore::open_in_memory().unwrap();

        let first = test_assignment("shipper-1", "addr-X", &["p-1"]);
        store.insert_assignment(&first).unwrap();
        drive_to_in_progress(&store, &first);

        let second = test_assignment("shipper-1", "addr-Y", &["p-2"]);
        store.insert_assignment(&second).unwrap();
        store
            .accept_assignment(&second.id, "shipper-1", now())
            .unwrap();
        let session2 = DeliverySession::new("shipper-1", now());
        store
            .insert_session(&session2, &[second.id.clone()])
            .unwrap();

        let result = store.start_session(&session2.id, now());
        assert!(matches!(result, Err(StoreError::ActiveSessionExists(_))));
    }

    #[test]
    fn terminal_session_status_set_once() {
        let store = DeliveryStore::open_in_memory().unwrap();
        let assignment = test_assignment("shipper-1", "addr-X", &["p-1"]);
        store.insert_assignment(&assignment).unwrap();
        let session_id = drive_to_in_progress(&store, &assignment);

        let finished = store
            .finish_session(&session_id, SessionStatus::Completed, now())
            .unwrap();
        assert_eq!(finished.status, SessionStatus::Completed);
        assert!(finished.ended_at.is_some());

        let again = store.finish_session(&session_id, SessionStatus::Failed, now());
        assert!(matches!(again, Err(StoreError::IllegalTransition { .. })));
    }

    #[test]
    fn conclude_attaches_route_outcome() {
        let store = DeliveryStore::open_in_memory().unwrap();
        let assignment = test_assignment("shipper-1", "addr-X", &["p-1"]);
        store.insert_assignment(&assignment).unwrap();
        let session_id = drive_to_in_progress(&store, &assignment);

        let failed = store
            .conclude_assignment(
                &assignment.id,
                AssignmentStatus::Failed,
                Some("receiver absent"),
                &test_route(),
            )
            .unwrap();
        assert_eq!(failed.status, AssignmentStatus::Failed);
        assert_eq!(failed.fail_reason.as_deref(), Some("receiver absent"));
        assert_eq!(failed.distance_m, Some(900.0));
        assert!(failed.waypoints.is_some());

        let found = store
            .find_assignment_for_parcel(&session_id, "p-1")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, assignment.id);
    }

    #[test]
    fn listing_orders_by_scan_time_desc_with_pagination() {
        let store = DeliveryStore::open_in_memory().unwrap();
        let base = now();

        let mut ids = Vec::new();
        for (i, parcel) in ["p-1", "p-2", "p-3"].iter().enumerate() {
            let assignment = test_assignment("shipper-1", "addr-X", &[parcel]);
            store.insert_assignment(&assignment).unwrap();
            store
                .accept_assignment(
                    &assignment.id,
                    "shipper-1",
                    base + chrono::Duration::seconds(i as i64),
                )
                .unwrap();
            ids.push(assignment.id);
        }

        let window_start = base - chrono::Duration::hours(1);
        let window_end = base + chrono::Duration::hours(1);
        let page = store
            .list_assignments(
                "shipper-1",
                &[AssignmentStatus::Accepted],
                window_start,
                window_end,
                0,
                2,
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        // Most recent scan first.
        assert_eq!(page[0].id, ids[2]);
        assert_eq!(page[1].id, ids[1]);

        let next = store
            .list_assignments(
                "shipper-1",
                &[AssignmentStatus::Accepted],
                window_start,
                window_end,
                1,
                2,
            )
            .unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id, ids[0]);
    }

    #[test]
    fn sample_history_roundtrip() {
        let store = DeliveryStore::open_in_memory().unwrap();
        let sample = LocationSample {
            session_id: "sess-1".to_string(),
            shipper_id: "shipper-1".to_string(),
            lat: 52.52,
            lon: 13.405,
            recorded_at: now(),
            accuracy_m: Some(4.5),
            speed_mps: Some(6.0),
            nearest_node_id: Some("n-1".to_string()),
            distance_to_node_m: Some(12.0),
        };
        store.insert_sample(&sample).unwrap();

        let history = store.samples_for_session("sess-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].nearest_node_id.as_deref(), Some("n-1"));
    }

    #[test]
    fn open_parcel_ids_filters_candidates() {
        let store = DeliveryStore::open_in_memory().unwrap();
        store
            .insert_assignment(&test_assignment("shipper-1", "addr-X", &["p-1"]))
            .unwrap();

        let open = store
            .open_parcel_ids(&["p-1".to_string(), "p-2".to_string()])
            .unwrap();
        assert!(open.contains("p-1"));
        assert!(!open.contains("p-2"));
    }
}
