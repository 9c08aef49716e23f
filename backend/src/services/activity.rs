//! Break, prayer and outside-work periods.

use serde_json::json;

use crate::error::{AppError, RejectionCode};
use crate::models::activity_period::{ActivityPeriod, PeriodType};
use crate::models::aggregate::BreakAlert;
use crate::models::attendance::AttendanceRecord;
use crate::models::branch::BreakPolicy;
use crate::models::notification::{NotificationKind, Recipient};
use crate::models::user::CurrentUser;
use crate::repositories::transition;
use crate::services::CoreContext;
use crate::types::AttendanceId;

#[derive(Clone)]
pub struct ActivityTracker {
    ctx: CoreContext,
}

impl ActivityTracker {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Picks the record a staff request refers to: the given one if the
    /// caller may act on it, otherwise the caller's open record.
    pub async fn resolve_attendance(
        &self,
        user: &CurrentUser,
        attendance_id: Option<AttendanceId>,
    ) -> Result<AttendanceId, AppError> {
        match attendance_id {
            Some(id) => {
                let aggregate = self.ctx.load(id).await?;
                if aggregate.record.user_id != user.id && !user.is_admin() {
                    return Err(AppError::Forbidden(
                        "Attendance record belongs to another user".to_string(),
                    ));
                }
                Ok(id)
            }
            None => self
                .ctx
                .store
                .find_open_for_user(user.id)
                .await?
                .map(|record| record.id)
                .ok_or_else(|| AppError::rejected(RejectionCode::NotActive, "Not clocked in")),
        }
    }

    async fn break_policy(&self, attendance_id: AttendanceId) -> Result<BreakPolicy, AppError> {
        let aggregate = self.ctx.load(attendance_id).await?;
        Ok(self
            .ctx
            .shop_config(aggregate.record.branch_id, aggregate.record.work_date)
            .await?
            .break_policy())
    }

    pub async fn start(
        &self,
        attendance_id: AttendanceId,
        period_type: PeriodType,
        reason: Option<String>,
    ) -> Result<ActivityPeriod, AppError> {
        let now = self.ctx.clock.now();
        let (_, period) = transition(self.ctx.store.as_ref(), attendance_id, |agg| {
            agg.start_period(period_type, reason.clone(), now)
        })
        .await?;
        tracing::info!(
            attendance_id = %attendance_id,
            period_type = %period_type,
            "Activity period started"
        );
        Ok(period)
    }

    pub async fn end(
        &self,
        attendance_id: AttendanceId,
        period_type: PeriodType,
    ) -> Result<ActivityPeriod, AppError> {
        let policy = self.break_policy(attendance_id).await?;
        let now = self.ctx.clock.now();
        let (aggregate, ended) = transition(self.ctx.store.as_ref(), attendance_id, |agg| {
            agg.end_period(period_type, policy, now)
        })
        .await?;
        tracing::info!(
            attendance_id = %attendance_id,
            period_type = %period_type,
            duration_minutes = ended.period.duration_minutes.unwrap_or(0),
            "Activity period ended"
        );
        if let Some(alert) = ended.alert {
            let record = &aggregate.record;
            self.send_break_alert(record, record.break_minutes, alert, policy);
        }
        Ok(ended.period)
    }

    fn send_break_alert(
        &self,
        record: &AttendanceRecord,
        break_minutes: i32,
        alert: BreakAlert,
        policy: BreakPolicy,
    ) {
        let payload = json!({
            "attendance_id": record.id,
            "break_minutes": break_minutes,
            "allowance_minutes": policy.allowance_minutes,
            "warning_minutes": policy.warning_minutes,
        });
        match alert {
            BreakAlert::Warning => self.ctx.notifier.notify(
                Recipient::User(record.user_id),
                NotificationKind::BreakWarning,
                payload,
            ),
            BreakAlert::Exceeded => {
                self.ctx.notifier.notify(
                    Recipient::User(record.user_id),
                    NotificationKind::BreakExceeded,
                    payload.clone(),
                );
                self.ctx.notifier.notify(
                    Recipient::BranchAdmins(record.branch_id),
                    NotificationKind::BreakExceeded,
                    json!({ "user_id": record.user_id, "details": payload }),
                );
            }
        }
    }

    /// One pass of the live break alert driver. Returns the number of alerts
    /// sent.
    pub async fn run_break_alerts(&self) -> usize {
        let open = match self.ctx.store.list_open().await {
            Ok(open) => open,
            Err(err) => {
                tracing::error!(error = %err, "Break alert driver could not list open records");
                return 0;
            }
        };

        let mut sent = 0;
        for record in open {
            match self.check_break(record.id).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(
                    attendance_id = %record.id,
                    driver = "break_alerts",
                    error = %err,
                    "Skipping record"
                ),
            }
        }
        tracing::debug!(sent, "Break alert tick finished");
        sent
    }

    async fn check_break(&self, attendance_id: AttendanceId) -> Result<bool, AppError> {
        let snapshot = self.ctx.load(attendance_id).await?;
        let on_break = snapshot
            .open_period()
            .is_some_and(|p| p.period_type == PeriodType::Break);
        if !on_break {
            return Ok(false);
        }
        let policy = self
            .ctx
            .shop_config(snapshot.record.branch_id, snapshot.record.work_date)
            .await?
            .break_policy();
        let now = self.ctx.clock.now();
        let (aggregate, alert) = transition(self.ctx.store.as_ref(), attendance_id, |agg| {
            Ok(agg.check_break_alert(policy, now))
        })
        .await?;
        match alert {
            Some(alert) => {
                let running = aggregate.open_period().map_or(0, |p| p.minutes_at(now));
                let record = &aggregate.record;
                self.send_break_alert(record, record.break_minutes + running, alert, policy);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
