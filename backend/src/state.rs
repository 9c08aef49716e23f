use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::repositories::{PgAttendanceStore, PgConfigStore};
use crate::services::notification::{
    LogNotificationSink, NotificationSink, WebhookNotificationSink,
};
use crate::services::{
    ActivityTracker, CachedConfigStore, ClockController, CoreContext, EndOfDaySweeper,
    EvidenceStore, GeofenceMonitor, NotificationGateway, OvertimeWorkflow,
};
use crate::utils::time::{Clock, SystemClock};
use crate::workers::WorkerServices;

/// Wires the Postgres stores, the cached configuration and the configured
/// notification sink into one engine context.
pub fn production_context(config: &Config, pool: PgPool) -> anyhow::Result<CoreContext> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ttl = chrono::Duration::from_std(config.config_cache_ttl)
        .context("CONFIG_CACHE_TTL_SECS is out of range")?;
    let config_store = CachedConfigStore::new(
        Arc::new(PgConfigStore::new(pool.clone(), config.time_zone)),
        clock.clone(),
        ttl,
    );

    let sink: Arc<dyn NotificationSink> = match &config.notification_webhook_url {
        Some(url) => Arc::new(WebhookNotificationSink::new(
            url.clone(),
            config.notification_timeout,
        )?),
        None => Arc::new(LogNotificationSink),
    };

    Ok(CoreContext::new(
        Arc::new(PgAttendanceStore::new(pool)),
        Arc::new(config_store),
        NotificationGateway::new(sink, clock.clone()),
        clock,
        config.engine_settings(),
    ))
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub context: CoreContext,
    pub clock: ClockController,
    pub activity: ActivityTracker,
    pub overtime: OvertimeWorkflow,
    pub evidence: Arc<dyn EvidenceStore>,
}

impl AppState {
    pub fn new(config: Config, context: CoreContext, evidence: Arc<dyn EvidenceStore>) -> Self {
        Self {
            config,
            clock: ClockController::new(context.clone()),
            activity: ActivityTracker::new(context.clone()),
            overtime: OvertimeWorkflow::new(context.clone()),
            context,
            evidence,
        }
    }

    /// Services driven by the background workers, sharing this state's context.
    pub fn worker_services(&self) -> WorkerServices {
        WorkerServices {
            geofence: GeofenceMonitor::new(self.context.clone()),
            overtime: self.overtime.clone(),
            activity: self.activity.clone(),
            end_of_day: EndOfDaySweeper::new(self.context.clone()),
        }
    }
}
