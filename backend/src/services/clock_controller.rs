//! Clock-in, clock-out and the read side of attendance.

use chrono::NaiveDate;

use crate::error::{AppError, RejectionCode};
use crate::models::attendance::{
    AttendanceRecord, AttendanceState, AttendanceStatusResponse, CloseReason, NewAttendance,
};
use crate::models::branch::Branch;
use crate::services::CoreContext;
use crate::types::{AttendanceId, UserId};
use crate::utils::geo::GeoPoint;
use crate::utils::time::local_date;

#[derive(Clone)]
pub struct ClockController {
    ctx: CoreContext,
}

/// Assigned branch closest to `location`; ties go to the lowest branch id.
pub fn nearest_branch(branches: &[Branch], location: GeoPoint) -> Option<(&Branch, f64)> {
    branches
        .iter()
        .map(|branch| (branch, location.distance_m(&branch.location)))
        .min_by(|(a, da), (b, db)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)))
}

impl ClockController {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    async fn nearest(&self, user_id: UserId, location: GeoPoint) -> Result<(Branch, f64), AppError> {
        let branches = self.ctx.config.branches_for_user(user_id).await?;
        nearest_branch(&branches, location)
            .map(|(branch, distance)| (branch.clone(), distance))
            .ok_or_else(|| {
                AppError::rejected(
                    RejectionCode::NoBranchAssignment,
                    "User is not assigned to any branch",
                )
            })
    }

    pub async fn clock_in(
        &self,
        user_id: UserId,
        location: GeoPoint,
        evidence: Option<String>,
    ) -> Result<AttendanceRecord, AppError> {
        location.validate()?;
        let (branch, distance_m) = self.nearest(user_id, location).await?;
        let now = self.ctx.clock.now();
        let work_date = local_date(now, &branch.time_zone);

        if self.ctx.store.find_open_for_user(user_id).await?.is_some() {
            return Err(AppError::rejected(
                RejectionCode::AlreadyOpen,
                "Already clocked in",
            ));
        }
        let reentry = match self
            .ctx
            .store
            .find_latest_for_user_on(user_id, work_date)
            .await?
        {
            Some(_) => {
                if !self.ctx.store.has_reentry_grant(user_id, work_date).await? {
                    return Err(AppError::rejected(
                        RejectionCode::AlreadyClockedOut,
                        format!("Already clocked out for {}", work_date),
                    ));
                }
                true
            }
            None => false,
        };

        let shop = self.ctx.shop_config(branch.id, work_date).await?;
        let geofence_enabled = self.ctx.config.geofence_enabled(user_id).await?;
        if geofence_enabled && distance_m > shop.geofence_radius_m {
            return Err(AppError::rejected(
                RejectionCode::OutsideGeofence,
                format!(
                    "{:.0} m from {} (allowed {:.0} m)",
                    distance_m, branch.name, shop.geofence_radius_m
                ),
            ));
        }

        let record = AttendanceRecord::open(
            NewAttendance {
                user_id,
                branch_id: branch.id,
                work_date,
                expected_minutes: shop.expected_minutes,
                location,
                distance_m,
                evidence,
                geofence_enabled,
                allow_reentry: reentry,
            },
            now,
        );
        self.ctx.store.insert_open(&record, reentry).await?;
        tracing::info!(
            attendance_id = %record.id,
            user_id = %user_id,
            branch_id = %branch.id,
            distance_m = distance_m,
            reentry,
            "Clocked in"
        );
        Ok(record)
    }

    /// Manual clock-out. Repeating it after the record closed returns the
    /// closed record unchanged.
    pub async fn clock_out(
        &self,
        user_id: UserId,
        location: GeoPoint,
        evidence: Option<String>,
    ) -> Result<AttendanceRecord, AppError> {
        location.validate()?;
        let Some(open) = self.ctx.store.find_open_for_user(user_id).await? else {
            return self.latest_closed(user_id, location).await;
        };

        let (aggregate, summary) = self
            .ctx
            .close(open.id, CloseReason::Manual, Some(location), evidence)
            .await?;
        if let Some(summary) = summary {
            tracing::info!(
                attendance_id = %aggregate.record.id,
                user_id = %user_id,
                close_reason = %summary.reason,
                total_working_minutes = summary.total_working_minutes,
                "Clocked out"
            );
        }
        Ok(aggregate.record)
    }

    /// Most recent closed record from today or yesterday, so a repeated
    /// clock-out that crosses local midnight still sees its record.
    async fn latest_closed(
        &self,
        user_id: UserId,
        location: GeoPoint,
    ) -> Result<AttendanceRecord, AppError> {
        let not_open = || AppError::rejected(RejectionCode::NotOpen, "Not clocked in");
        let (branch, _) = match self.nearest(user_id, location).await {
            Ok(found) => found,
            Err(AppError::Rejected { .. }) => return Err(not_open()),
            Err(err) => return Err(err),
        };
        let today = local_date(self.ctx.clock.now(), &branch.time_zone);
        let yesterday = today.pred_opt().unwrap_or(today);
        self.ctx
            .store
            .list_for_user(user_id, yesterday, today)
            .await?
            .into_iter()
            .filter(|record| !record.is_open())
            .max_by_key(|record| record.clock_out_at)
            .ok_or_else(not_open)
    }

    /// Closes any open record on an admin's behalf.
    pub async fn close_by_admin(
        &self,
        attendance_id: AttendanceId,
        location: Option<GeoPoint>,
        admin_id: UserId,
    ) -> Result<AttendanceRecord, AppError> {
        if let Some(point) = location {
            point.validate()?;
        }
        let (aggregate, summary) = self
            .ctx
            .close(attendance_id, CloseReason::Admin, location, None)
            .await?;
        match summary {
            Some(summary) => tracing::info!(
                attendance_id = %attendance_id,
                user_id = %aggregate.record.user_id,
                admin_id = %admin_id,
                close_reason = %summary.reason,
                "Attendance closed by admin"
            ),
            None => {
                return Err(AppError::rejected(
                    RejectionCode::NotOpen,
                    "Attendance record is already closed",
                ))
            }
        }
        Ok(aggregate.record)
    }

    pub async fn grant_reentry(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
        admin_id: UserId,
    ) -> Result<(), AppError> {
        self.ctx
            .store
            .grant_reentry(user_id, work_date, admin_id, self.ctx.clock.now())
            .await?;
        tracing::info!(user_id = %user_id, work_date = %work_date, admin_id = %admin_id, "Re-entry granted");
        Ok(())
    }

    /// Updates the most recent known location of the user's open record.
    pub async fn report_location(
        &self,
        user_id: UserId,
        location: GeoPoint,
    ) -> Result<AttendanceRecord, AppError> {
        location.validate()?;
        let open = self
            .ctx
            .store
            .find_open_for_user(user_id)
            .await?
            .ok_or_else(|| AppError::rejected(RejectionCode::NotActive, "Not clocked in"))?;
        let now = self.ctx.clock.now();
        let (aggregate, ()) = crate::repositories::transition(
            self.ctx.store.as_ref(),
            open.id,
            |agg| agg.record_location(location, now),
        )
        .await?;
        Ok(aggregate.record)
    }

    pub async fn status(&self, user_id: UserId) -> Result<AttendanceStatusResponse, AppError> {
        let Some(open) = self.ctx.store.find_open_for_user(user_id).await? else {
            let branches = self.ctx.config.branches_for_user(user_id).await?;
            let now = self.ctx.clock.now();
            let mut latest: Option<AttendanceRecord> = None;
            for branch in &branches {
                let day = local_date(now, &branch.time_zone);
                if let Some(record) = self.ctx.store.find_latest_for_user_on(user_id, day).await? {
                    if latest
                        .as_ref()
                        .map_or(true, |l| record.clock_in_at > l.clock_in_at)
                    {
                        latest = Some(record);
                    }
                }
            }
            let status = if latest.is_some() {
                AttendanceState::ClockedOut
            } else {
                AttendanceState::NotStarted
            };
            return Ok(AttendanceStatusResponse {
                status,
                record: latest,
                open_period: None,
                pending_overtime: None,
            });
        };

        let aggregate = self.ctx.load(open.id).await?;
        Ok(AttendanceStatusResponse {
            status: aggregate.state(),
            open_period: aggregate.open_period().cloned(),
            pending_overtime: aggregate.pending_overtime().cloned(),
            record: Some(aggregate.record),
        })
    }

    pub async fn history(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        self.ctx.store.list_for_user(user_id, from, to).await
    }

    pub async fn list_open(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        self.ctx.store.list_open().await
    }
}
