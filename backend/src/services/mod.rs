//! Presence engine services.
//!
//! Every service shares one [`CoreContext`]: the attendance store, the
//! (cached) configuration store, the notification gateway and the clock.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::aggregate::{AttendanceAggregate, CloseSummary};
use crate::models::attendance::CloseReason;
use crate::models::branch::{Branch, ShopConfig};
use crate::repositories::{transition, AttendanceStore, ConfigStore};
use crate::types::{AttendanceId, BranchId};
use crate::utils::geo::GeoPoint;
use crate::utils::time::Clock;

pub mod activity;
pub mod clock_controller;
pub mod config_cache;
pub mod end_of_day;
pub mod evidence;
pub mod geofence;
pub mod notification;
pub mod overtime;

pub use activity::ActivityTracker;
pub use clock_controller::ClockController;
pub use config_cache::CachedConfigStore;
pub use end_of_day::EndOfDaySweeper;
pub use evidence::{EvidenceStore, FsEvidenceStore};
pub use geofence::GeofenceMonitor;
pub use notification::NotificationGateway;
pub use overtime::OvertimeWorkflow;

/// Tunables of the automatic transitions.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub geofence_grace: Duration,
    /// Branch-local time after which open records are force-closed.
    pub end_of_day_cutoff: NaiveTime,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            geofence_grace: Duration::minutes(5),
            end_of_day_cutoff: NaiveTime::from_hms_opt(23, 55, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Clone)]
pub struct CoreContext {
    pub store: Arc<dyn AttendanceStore>,
    pub config: Arc<dyn ConfigStore>,
    pub notifier: NotificationGateway,
    pub clock: Arc<dyn Clock>,
    pub settings: EngineSettings,
}

impl CoreContext {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        config: Arc<dyn ConfigStore>,
        notifier: NotificationGateway,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            config,
            notifier,
            clock,
            settings,
        }
    }

    pub async fn branch(&self, branch_id: BranchId) -> Result<Branch, AppError> {
        self.config.branch(branch_id).await?.ok_or_else(|| {
            AppError::InternalServerError(anyhow::anyhow!("branch {} is not configured", branch_id))
        })
    }

    /// Shop settings for the branch on `work_date`, falling back to defaults.
    pub async fn shop_config(
        &self,
        branch_id: BranchId,
        work_date: NaiveDate,
    ) -> Result<ShopConfig, AppError> {
        Ok(self
            .config
            .shop_config(branch_id, work_date.weekday())
            .await?
            .unwrap_or_default())
    }

    pub async fn load(&self, id: AttendanceId) -> Result<AttendanceAggregate, AppError> {
        self.store
            .find_aggregate(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance record not found".to_string()))
    }

    /// Closes the record if `guard` still holds on the locked state.
    ///
    /// The close point defaults to the last known location. Returns `None`
    /// as summary when the record was already closed or the guard failed.
    pub async fn close_if<G>(
        &self,
        id: AttendanceId,
        reason: CloseReason,
        location: Option<GeoPoint>,
        evidence: Option<String>,
        guard: G,
    ) -> Result<(AttendanceAggregate, Option<CloseSummary>), AppError>
    where
        G: Fn(&AttendanceAggregate) -> bool + Send + Sync,
    {
        let snapshot = self.load(id).await?;
        let branch = self.branch(snapshot.record.branch_id).await?;
        let policy = self
            .shop_config(branch.id, snapshot.record.work_date)
            .await?
            .break_policy();
        let now = self.clock.now();

        transition(self.store.as_ref(), id, |agg| {
            if !guard(agg) {
                return Ok(None);
            }
            let point = location.unwrap_or(agg.record.last_location);
            let distance = point.distance_m(&branch.location);
            agg.close(reason, point, distance, evidence.clone(), policy, now)
        })
        .await
    }

    pub async fn close(
        &self,
        id: AttendanceId,
        reason: CloseReason,
        location: Option<GeoPoint>,
        evidence: Option<String>,
    ) -> Result<(AttendanceAggregate, Option<CloseSummary>), AppError> {
        self.close_if(id, reason, location, evidence, |_| true).await
    }
}
