//! Recurring geofence evaluation of open records.
//!
//! Each tick re-evaluates the persisted state: the grace window is the time
//! since the pending violation was detected, so nothing is lost on restart.

use serde_json::json;

use crate::error::AppError;
use crate::models::aggregate::GeofenceOutcome;
use crate::models::attendance::AttendanceRecord;
use crate::models::notification::{NotificationKind, Recipient};
use crate::repositories::transition;
use crate::services::CoreContext;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeofenceTick {
    pub evaluated: usize,
    pub violations_opened: usize,
    pub cleared: usize,
    pub auto_closed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct GeofenceMonitor {
    ctx: CoreContext,
}

impl GeofenceMonitor {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    pub async fn run_once(&self) -> GeofenceTick {
        let mut tick = GeofenceTick::default();
        let open = match self.ctx.store.list_open().await {
            Ok(open) => open,
            Err(err) => {
                tracing::error!(error = %err, "Geofence monitor could not list open records");
                return tick;
            }
        };

        for record in open.iter().filter(|r| r.geofence_enabled) {
            tick.evaluated += 1;
            match self.evaluate(record).await {
                Ok(GeofenceOutcome::ViolationOpened { .. }) => tick.violations_opened += 1,
                Ok(GeofenceOutcome::Cleared) => tick.cleared += 1,
                Ok(GeofenceOutcome::AutoClosed(_)) => tick.auto_closed += 1,
                Ok(_) => {}
                Err(err) => {
                    tick.failed += 1;
                    tracing::warn!(
                        attendance_id = %record.id,
                        driver = "geofence",
                        error = %err,
                        "Skipping record"
                    );
                }
            }
        }
        tracing::debug!(?tick, "Geofence tick finished");
        tick
    }

    async fn evaluate(&self, record: &AttendanceRecord) -> Result<GeofenceOutcome, AppError> {
        let branch = self.ctx.branch(record.branch_id).await?;
        let shop = self.ctx.shop_config(record.branch_id, record.work_date).await?;
        let policy = shop.break_policy();
        let grace = self.ctx.settings.geofence_grace;
        let now = self.ctx.clock.now();

        let (aggregate, outcome) = transition(self.ctx.store.as_ref(), record.id, |agg| {
            let distance = agg.record.last_location.checked_distance_m(&branch.location)?;
            agg.evaluate_geofence(distance, shop.geofence_radius_m, grace, policy, now)
        })
        .await?;

        let record = &aggregate.record;
        match &outcome {
            GeofenceOutcome::ViolationOpened { distance_m } => {
                tracing::info!(
                    attendance_id = %record.id,
                    user_id = %record.user_id,
                    distance_m = *distance_m,
                    radius_m = shop.geofence_radius_m,
                    "Geofence violation detected"
                );
                self.ctx.notifier.notify(
                    Recipient::User(record.user_id),
                    NotificationKind::GeofenceWarning,
                    json!({
                        "attendance_id": record.id,
                        "distance_m": distance_m,
                        "radius_m": shop.geofence_radius_m,
                        "grace_minutes": grace.num_minutes(),
                    }),
                );
            }
            GeofenceOutcome::Cleared => {
                tracing::info!(attendance_id = %record.id, "Geofence violation cleared");
            }
            GeofenceOutcome::AutoClosed(summary) => {
                tracing::info!(
                    attendance_id = %record.id,
                    user_id = %record.user_id,
                    close_reason = %summary.reason,
                    close_distance_m = record.close_distance_m.unwrap_or_default(),
                    "Attendance auto-closed"
                );
                let payload = json!({
                    "attendance_id": record.id,
                    "user_id": record.user_id,
                    "distance_m": record.close_distance_m,
                    "total_working_minutes": summary.total_working_minutes,
                });
                self.ctx.notifier.notify(
                    Recipient::User(record.user_id),
                    NotificationKind::GeofenceAutoClockout,
                    payload.clone(),
                );
                self.ctx.notifier.notify(
                    Recipient::BranchAdmins(record.branch_id),
                    NotificationKind::GeofenceAutoClockout,
                    payload,
                );
            }
            _ => {}
        }
        Ok(outcome)
    }
}
