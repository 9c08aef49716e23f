//! Postgres-backed attendance store.
//!
//! Enum columns are stored as TEXT and converted through `as_str` /
//! `FromStr`; coordinates are split into latitude/longitude columns.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgQueryResult, PgConnection, PgPool};
use std::fmt::Display;

use crate::error::{AppError, RejectionCode};
use crate::models::activity_period::ActivityPeriod;
use crate::models::aggregate::AttendanceAggregate;
use crate::models::attendance::AttendanceRecord;
use crate::models::geofence_violation::GeofenceViolation;
use crate::models::overtime_request::OvertimeRequest;
use crate::repositories::attendance_store::{AggregateUpdate, AttendanceStore};
use crate::types::{
    ActivityPeriodId, AttendanceId, BranchId, GeofenceViolationId, OvertimeRequestId, UserId,
};
use crate::utils::geo::GeoPoint;

const RECORD_COLUMNS: &str = "id, user_id, branch_id, work_date, clock_in_at, clock_out_at, \
    expected_minutes, clock_in_latitude, clock_in_longitude, clock_in_distance_m, clock_in_evidence, \
    clock_out_latitude, clock_out_longitude, clock_out_distance_m, clock_out_evidence, \
    last_latitude, last_longitude, last_location_at, total_working_minutes, break_minutes, \
    prayer_minutes, outside_work_minutes, excess_break_minutes, overtime_minutes, \
    ot_approved_minutes, geofence_enabled, break_exceeded, break_warning_sent, \
    break_exceeded_notified, allow_reentry, ot_request_id, ot_prompt_shown_at, close_reason, \
    close_distance_m, created_at, updated_at";

const PERIOD_COLUMNS: &str =
    "id, attendance_id, period_type, started_at, ended_at, duration_minutes, reason, force_closed";

const OVERTIME_COLUMNS: &str = "id, attendance_id, user_id, branch_id, status, reason, \
    requested_at, approved_minutes, decided_by, decided_at, decision_note";

const VIOLATION_COLUMNS: &str =
    "id, attendance_id, detected_at, distance_m, resolution, resolved_at";

/// An update keyed on a row locked in this transaction must hit exactly it.
fn expect_one_row(result: PgQueryResult, entity: &str, id: impl Display) -> Result<(), AppError> {
    match result.rows_affected() {
        1 => Ok(()),
        n => Err(AppError::InternalServerError(anyhow::anyhow!(
            "update of {} {} affected {} rows",
            entity,
            id,
            n
        ))),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttendanceRow {
    id: AttendanceId,
    user_id: UserId,
    branch_id: BranchId,
    work_date: NaiveDate,
    clock_in_at: DateTime<Utc>,
    clock_out_at: Option<DateTime<Utc>>,
    expected_minutes: i32,
    clock_in_latitude: f64,
    clock_in_longitude: f64,
    clock_in_distance_m: f64,
    clock_in_evidence: Option<String>,
    clock_out_latitude: Option<f64>,
    clock_out_longitude: Option<f64>,
    clock_out_distance_m: Option<f64>,
    clock_out_evidence: Option<String>,
    last_latitude: f64,
    last_longitude: f64,
    last_location_at: DateTime<Utc>,
    total_working_minutes: i32,
    break_minutes: i32,
    prayer_minutes: i32,
    outside_work_minutes: i32,
    excess_break_minutes: i32,
    overtime_minutes: i32,
    ot_approved_minutes: i32,
    geofence_enabled: bool,
    break_exceeded: bool,
    break_warning_sent: bool,
    break_exceeded_notified: bool,
    allow_reentry: bool,
    ot_request_id: Option<OvertimeRequestId>,
    ot_prompt_shown_at: Option<DateTime<Utc>>,
    close_reason: String,
    close_distance_m: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let clock_out_location = match (row.clock_out_latitude, row.clock_out_longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };
        Ok(AttendanceRecord {
            id: row.id,
            user_id: row.user_id,
            branch_id: row.branch_id,
            work_date: row.work_date,
            clock_in_at: row.clock_in_at,
            clock_out_at: row.clock_out_at,
            expected_minutes: row.expected_minutes,
            clock_in_location: GeoPoint::new(row.clock_in_latitude, row.clock_in_longitude),
            clock_in_distance_m: row.clock_in_distance_m,
            clock_in_evidence: row.clock_in_evidence,
            clock_out_location,
            clock_out_distance_m: row.clock_out_distance_m,
            clock_out_evidence: row.clock_out_evidence,
            last_location: GeoPoint::new(row.last_latitude, row.last_longitude),
            last_location_at: row.last_location_at,
            total_working_minutes: row.total_working_minutes,
            break_minutes: row.break_minutes,
            prayer_minutes: row.prayer_minutes,
            outside_work_minutes: row.outside_work_minutes,
            excess_break_minutes: row.excess_break_minutes,
            overtime_minutes: row.overtime_minutes,
            ot_approved_minutes: row.ot_approved_minutes,
            geofence_enabled: row.geofence_enabled,
            break_exceeded: row.break_exceeded,
            break_warning_sent: row.break_warning_sent,
            break_exceeded_notified: row.break_exceeded_notified,
            allow_reentry: row.allow_reentry,
            ot_request_id: row.ot_request_id,
            ot_prompt_shown_at: row.ot_prompt_shown_at,
            close_reason: row.close_reason.parse()?,
            close_distance_m: row.close_distance_m,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PeriodRow {
    id: ActivityPeriodId,
    attendance_id: AttendanceId,
    period_type: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
    reason: Option<String>,
    force_closed: bool,
}

impl TryFrom<PeriodRow> for ActivityPeriod {
    type Error = AppError;

    fn try_from(row: PeriodRow) -> Result<Self, Self::Error> {
        Ok(ActivityPeriod {
            id: row.id,
            attendance_id: row.attendance_id,
            period_type: row.period_type.parse()?,
            started_at: row.started_at,
            ended_at: row.ended_at,
            duration_minutes: row.duration_minutes,
            reason: row.reason,
            force_closed: row.force_closed,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OvertimeRow {
    id: OvertimeRequestId,
    attendance_id: AttendanceId,
    user_id: UserId,
    branch_id: BranchId,
    status: String,
    reason: String,
    requested_at: DateTime<Utc>,
    approved_minutes: Option<i32>,
    decided_by: Option<UserId>,
    decided_at: Option<DateTime<Utc>>,
    decision_note: Option<String>,
}

impl TryFrom<OvertimeRow> for OvertimeRequest {
    type Error = AppError;

    fn try_from(row: OvertimeRow) -> Result<Self, Self::Error> {
        Ok(OvertimeRequest {
            id: row.id,
            attendance_id: row.attendance_id,
            user_id: row.user_id,
            branch_id: row.branch_id,
            status: row.status.parse()?,
            reason: row.reason,
            requested_at: row.requested_at,
            approved_minutes: row.approved_minutes,
            decided_by: row.decided_by,
            decided_at: row.decided_at,
            decision_note: row.decision_note,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ViolationRow {
    id: GeofenceViolationId,
    attendance_id: AttendanceId,
    detected_at: DateTime<Utc>,
    distance_m: f64,
    resolution: String,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ViolationRow> for GeofenceViolation {
    type Error = AppError;

    fn try_from(row: ViolationRow) -> Result<Self, Self::Error> {
        Ok(GeofenceViolation {
            id: row.id,
            attendance_id: row.attendance_id,
            detected_at: row.detected_at,
            distance_m: row.distance_m,
            resolution: row.resolution.parse()?,
            resolved_at: row.resolved_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct PgAttendanceStore {
    pool: PgPool,
}

impl PgAttendanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_children(
        conn: &mut PgConnection,
        record: AttendanceRecord,
    ) -> Result<AttendanceAggregate, AppError> {
        let periods: Vec<PeriodRow> = sqlx::query_as(&format!(
            "SELECT {} FROM activity_periods WHERE attendance_id = $1 ORDER BY started_at",
            PERIOD_COLUMNS
        ))
        .bind(record.id)
        .fetch_all(&mut *conn)
        .await?;
        let requests: Vec<OvertimeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM overtime_requests WHERE attendance_id = $1 ORDER BY requested_at",
            OVERTIME_COLUMNS
        ))
        .bind(record.id)
        .fetch_all(&mut *conn)
        .await?;
        let violations: Vec<ViolationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM geofence_violations WHERE attendance_id = $1 ORDER BY detected_at",
            VIOLATION_COLUMNS
        ))
        .bind(record.id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(AttendanceAggregate {
            record,
            periods: convert_all(periods)?,
            overtime_requests: convert_all(requests)?,
            violations: convert_all(violations)?,
        })
    }

    async fn insert_record(conn: &mut PgConnection, r: &AttendanceRecord) -> Result<(), AppError> {
        let query = format!(
            "INSERT INTO attendance_records ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, \
             $28, $29, $30, $31, $32, $33, $34, $35, $36)",
            RECORD_COLUMNS
        );
        sqlx::query(&query)
            .bind(r.id)
            .bind(r.user_id)
            .bind(r.branch_id)
            .bind(r.work_date)
            .bind(r.clock_in_at)
            .bind(r.clock_out_at)
            .bind(r.expected_minutes)
            .bind(r.clock_in_location.latitude)
            .bind(r.clock_in_location.longitude)
            .bind(r.clock_in_distance_m)
            .bind(&r.clock_in_evidence)
            .bind(r.clock_out_location.map(|p| p.latitude))
            .bind(r.clock_out_location.map(|p| p.longitude))
            .bind(r.clock_out_distance_m)
            .bind(&r.clock_out_evidence)
            .bind(r.last_location.latitude)
            .bind(r.last_location.longitude)
            .bind(r.last_location_at)
            .bind(r.total_working_minutes)
            .bind(r.break_minutes)
            .bind(r.prayer_minutes)
            .bind(r.outside_work_minutes)
            .bind(r.excess_break_minutes)
            .bind(r.overtime_minutes)
            .bind(r.ot_approved_minutes)
            .bind(r.geofence_enabled)
            .bind(r.break_exceeded)
            .bind(r.break_warning_sent)
            .bind(r.break_exceeded_notified)
            .bind(r.allow_reentry)
            .bind(r.ot_request_id)
            .bind(r.ot_prompt_shown_at)
            .bind(r.close_reason.as_str())
            .bind(r.close_distance_m)
            .bind(r.created_at)
            .bind(r.updated_at)
            .execute(&mut *conn)
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::rejected(
                    RejectionCode::AlreadyOpen,
                    "User already has an open attendance record",
                ),
                _ => AppError::from(err),
            })?;
        Ok(())
    }

    async fn update_record(conn: &mut PgConnection, r: &AttendanceRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE attendance_records SET clock_out_at = $2, clock_out_latitude = $3, \
             clock_out_longitude = $4, clock_out_distance_m = $5, clock_out_evidence = $6, \
             last_latitude = $7, last_longitude = $8, last_location_at = $9, \
             total_working_minutes = $10, break_minutes = $11, prayer_minutes = $12, \
             outside_work_minutes = $13, excess_break_minutes = $14, overtime_minutes = $15, \
             ot_approved_minutes = $16, break_exceeded = $17, break_warning_sent = $18, \
             break_exceeded_notified = $19, ot_request_id = $20, ot_prompt_shown_at = $21, \
             close_reason = $22, close_distance_m = $23, updated_at = $24 WHERE id = $1",
        )
        .bind(r.id)
        .bind(r.clock_out_at)
        .bind(r.clock_out_location.map(|p| p.latitude))
        .bind(r.clock_out_location.map(|p| p.longitude))
        .bind(r.clock_out_distance_m)
        .bind(&r.clock_out_evidence)
        .bind(r.last_location.latitude)
        .bind(r.last_location.longitude)
        .bind(r.last_location_at)
        .bind(r.total_working_minutes)
        .bind(r.break_minutes)
        .bind(r.prayer_minutes)
        .bind(r.outside_work_minutes)
        .bind(r.excess_break_minutes)
        .bind(r.overtime_minutes)
        .bind(r.ot_approved_minutes)
        .bind(r.break_exceeded)
        .bind(r.break_warning_sent)
        .bind(r.break_exceeded_notified)
        .bind(r.ot_request_id)
        .bind(r.ot_prompt_shown_at)
        .bind(r.close_reason.as_str())
        .bind(r.close_distance_m)
        .bind(r.updated_at)
        .execute(&mut *conn)
        .await?;
        expect_one_row(result, "attendance record", r.id)
    }

    async fn save_period(
        conn: &mut PgConnection,
        p: &ActivityPeriod,
        exists: bool,
    ) -> Result<(), AppError> {
        if exists {
            let result = sqlx::query(
                "UPDATE activity_periods SET ended_at = $2, duration_minutes = $3, \
                 force_closed = $4 WHERE id = $1",
            )
            .bind(p.id)
            .bind(p.ended_at)
            .bind(p.duration_minutes)
            .bind(p.force_closed)
            .execute(&mut *conn)
            .await?;
            return expect_one_row(result, "activity period", p.id);
        }
        sqlx::query(
            "INSERT INTO activity_periods (id, attendance_id, period_type, started_at, ended_at, \
             duration_minutes, reason, force_closed) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(p.id)
        .bind(p.attendance_id)
        .bind(p.period_type.as_str())
        .bind(p.started_at)
        .bind(p.ended_at)
        .bind(p.duration_minutes)
        .bind(&p.reason)
        .bind(p.force_closed)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn save_overtime(
        conn: &mut PgConnection,
        o: &OvertimeRequest,
        exists: bool,
    ) -> Result<(), AppError> {
        if exists {
            let result = sqlx::query(
                "UPDATE overtime_requests SET status = $2, approved_minutes = $3, \
                 decided_by = $4, decided_at = $5, decision_note = $6 WHERE id = $1",
            )
            .bind(o.id)
            .bind(o.status.as_str())
            .bind(o.approved_minutes)
            .bind(o.decided_by)
            .bind(o.decided_at)
            .bind(&o.decision_note)
            .execute(&mut *conn)
            .await?;
            return expect_one_row(result, "overtime request", o.id);
        }
        sqlx::query(
            "INSERT INTO overtime_requests (id, attendance_id, user_id, branch_id, status, reason, \
             requested_at, approved_minutes, decided_by, decided_at, decision_note) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(o.id)
        .bind(o.attendance_id)
        .bind(o.user_id)
        .bind(o.branch_id)
        .bind(o.status.as_str())
        .bind(&o.reason)
        .bind(o.requested_at)
        .bind(o.approved_minutes)
        .bind(o.decided_by)
        .bind(o.decided_at)
        .bind(&o.decision_note)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn save_violation(
        conn: &mut PgConnection,
        v: &GeofenceViolation,
        exists: bool,
    ) -> Result<(), AppError> {
        if exists {
            let result = sqlx::query(
                "UPDATE geofence_violations SET resolution = $2, resolved_at = $3 WHERE id = $1",
            )
            .bind(v.id)
            .bind(v.resolution.as_str())
            .bind(v.resolved_at)
            .execute(&mut *conn)
            .await?;
            return expect_one_row(result, "geofence violation", v.id);
        }
        sqlx::query(
            "INSERT INTO geofence_violations (id, attendance_id, detected_at, distance_m, \
             resolution, resolved_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(v.id)
        .bind(v.attendance_id)
        .bind(v.detected_at)
        .bind(v.distance_m)
        .bind(v.resolution.as_str())
        .bind(v.resolved_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Writes the rows that differ between `before` and `after`. Updates run
    /// before inserts so the partial unique indexes never see two open rows.
    async fn persist_changes(
        conn: &mut PgConnection,
        before: &AttendanceAggregate,
        after: &AttendanceAggregate,
    ) -> Result<(), AppError> {
        for p in &after.periods {
            if let Some(old) = before.periods.iter().find(|o| o.id == p.id) {
                if old != p {
                    Self::save_period(conn, p, true).await?;
                }
            }
        }
        for o in &after.overtime_requests {
            if let Some(old) = before.overtime_requests.iter().find(|x| x.id == o.id) {
                if old != o {
                    Self::save_overtime(conn, o, true).await?;
                }
            }
        }
        for v in &after.violations {
            if let Some(old) = before.violations.iter().find(|x| x.id == v.id) {
                if old != v {
                    Self::save_violation(conn, v, true).await?;
                }
            }
        }

        for p in &after.periods {
            if !before.periods.iter().any(|o| o.id == p.id) {
                Self::save_period(conn, p, false).await?;
            }
        }
        for o in &after.overtime_requests {
            if !before.overtime_requests.iter().any(|x| x.id == o.id) {
                Self::save_overtime(conn, o, false).await?;
            }
        }
        for v in &after.violations {
            if !before.violations.iter().any(|x| x.id == v.id) {
                Self::save_violation(conn, v, false).await?;
            }
        }

        if before.record != after.record {
            Self::update_record(conn, &after.record).await?;
        }
        Ok(())
    }

    async fn fetch_records(
        &self,
        query: &str,
        user_id: Option<UserId>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut q = sqlx::query_as::<_, AttendanceRow>(query);
        if let Some(user_id) = user_id {
            q = q.bind(user_id);
        }
        if let Some((from, to)) = range {
            q = q.bind(from).bind(to);
        }
        let rows = q.fetch_all(&self.pool).await?;
        convert_all(rows)
    }
}

#[async_trait]
impl AttendanceStore for PgAttendanceStore {
    async fn insert_open(
        &self,
        record: &AttendanceRecord,
        consume_grant: bool,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        if consume_grant {
            let consumed =
                sqlx::query("DELETE FROM reentry_grants WHERE user_id = $1 AND work_date = $2")
                    .bind(record.user_id)
                    .bind(record.work_date)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
            if consumed == 0 {
                return Err(AppError::rejected(
                    RejectionCode::AlreadyClockedOut,
                    "Already clocked out for this work date",
                ));
            }
        }
        Self::insert_record(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_aggregate(
        &self,
        id: AttendanceId,
    ) -> Result<Option<AttendanceAggregate>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<AttendanceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM attendance_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        match row {
            Some(row) => Ok(Some(Self::load_children(&mut conn, row.try_into()?).await?)),
            None => Ok(None),
        }
    }

    async fn find_open_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE user_id = $1 AND close_reason = 'none'",
            RECORD_COLUMNS
        );
        Ok(self
            .fetch_records(&query, Some(user_id), None)
            .await?
            .into_iter()
            .next())
    }

    async fn find_latest_for_user_on(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE user_id = $1 AND work_date BETWEEN $2 AND $3 \
             ORDER BY clock_in_at DESC LIMIT 1",
            RECORD_COLUMNS
        );
        Ok(self
            .fetch_records(&query, Some(user_id), Some((work_date, work_date)))
            .await?
            .into_iter()
            .next())
    }

    async fn list_open(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE close_reason = 'none' ORDER BY clock_in_at",
            RECORD_COLUMNS
        );
        self.fetch_records(&query, None, None).await
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE user_id = $1 AND work_date BETWEEN $2 AND $3 \
             ORDER BY clock_in_at DESC",
            RECORD_COLUMNS
        );
        self.fetch_records(&query, Some(user_id), Some((from, to)))
            .await
    }

    async fn list_pending_overtime(
        &self,
        branch_id: Option<BranchId>,
    ) -> Result<Vec<OvertimeRequest>, AppError> {
        let query = format!(
            "SELECT {} FROM overtime_requests WHERE status = 'pending' \
             AND ($1::uuid IS NULL OR branch_id = $1) ORDER BY requested_at",
            OVERTIME_COLUMNS
        );
        let rows: Vec<OvertimeRow> = sqlx::query_as(&query)
            .bind(branch_id)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn find_overtime_request(
        &self,
        id: OvertimeRequestId,
    ) -> Result<Option<OvertimeRequest>, AppError> {
        let row: Option<OvertimeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM overtime_requests WHERE id = $1",
            OVERTIME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OvertimeRequest::try_from).transpose()
    }

    async fn update_aggregate(
        &self,
        id: AttendanceId,
        apply: &mut AggregateUpdate<'_>,
    ) -> Result<AttendanceAggregate, AppError> {
        let mut tx = self.pool.begin().await?;
        let row: AttendanceRow = sqlx::query_as(&format!(
            "SELECT {} FROM attendance_records WHERE id = $1 FOR UPDATE",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Attendance record not found".to_string()))?;
        let current = Self::load_children(&mut tx, row.try_into()?).await?;

        let mut next = current.clone();
        apply(&mut next)?;
        if next != current {
            Self::persist_changes(&mut tx, &current, &next).await?;
        }
        tx.commit().await?;
        Ok(next)
    }

    async fn grant_reentry(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
        granted_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO reentry_grants (user_id, work_date, granted_by, granted_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, work_date) DO UPDATE SET granted_by = $3, granted_at = $4",
        )
        .bind(user_id)
        .bind(work_date)
        .bind(granted_by)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn has_reentry_grant(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reentry_grants WHERE user_id = $1 AND work_date = $2)",
        )
        .bind(user_id)
        .bind(work_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
