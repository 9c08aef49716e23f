#![allow(dead_code)]
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use presence_backend::{
    config::Config,
    models::{
        attendance::AttendanceRecord,
        branch::{Branch, ShopConfig},
        notification::{Notification, NotificationKind, Recipient},
        user::UserRole,
    },
    repositories::{AttendanceStore, MemoryAttendanceStore, StaticConfigStore},
    services::{
        notification::RecordingNotificationSink, ActivityTracker, ClockController, CoreContext,
        EndOfDaySweeper, EngineSettings, FsEvidenceStore, GeofenceMonitor, NotificationGateway,
        OvertimeWorkflow,
    },
    state::AppState,
    types::{BranchId, UserId},
    utils::{
        geo::{offset_north, GeoPoint},
        jwt::create_access_token,
        time::{Clock, ManualClock},
    },
};

pub const JWT_SECRET: &str = "test-secret";

/// 09:00 in Riyadh on a Wednesday.
pub fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
}

pub fn riyadh_branch(name: &str) -> Branch {
    Branch {
        id: BranchId::new(),
        name: name.to_string(),
        location: GeoPoint::new(24.7136, 46.6753),
        time_zone: chrono_tz::Asia::Riyadh,
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "JWT_SECRET" => Some(JWT_SECRET.to_string()),
        "APP_TIMEZONE" => Some("Asia/Riyadh".to_string()),
        _ => None,
    })
    .expect("test config")
}

pub fn create_test_token(user_id: UserId, role: UserRole) -> String {
    create_access_token(user_id, role, JWT_SECRET, 1).expect("create token")
}

/// In-memory engine with one branch, one staff member and one admin.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryAttendanceStore>,
    pub sink: Arc<RecordingNotificationSink>,
    pub context: CoreContext,
    pub branch: Branch,
    pub staff: UserId,
    pub admin: UserId,
    evidence_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ShopConfig::default())
    }

    pub fn with_config(config: ShopConfig) -> Self {
        Self::build(config, |store, _| store)
    }

    /// `customize` receives the prepared store and the staff user id.
    pub fn build(
        config: ShopConfig,
        customize: impl FnOnce(StaticConfigStore, UserId) -> StaticConfigStore,
    ) -> Self {
        let branch = riyadh_branch("Olaya");
        let staff = UserId::new();
        let admin = UserId::new();
        let config_store = StaticConfigStore::new()
            .with_branch(branch.clone())
            .with_config(branch.id, config)
            .assign(staff, branch.id)
            .assign(admin, branch.id);
        let config_store = customize(config_store, staff);

        let clock = Arc::new(ManualClock::new(start_of_day()));
        let store = Arc::new(MemoryAttendanceStore::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        let context = CoreContext::new(
            store.clone(),
            Arc::new(config_store),
            NotificationGateway::new(sink.clone(), clock.clone()),
            clock.clone(),
            EngineSettings::default(),
        );

        Self {
            clock,
            store,
            sink,
            context,
            branch,
            staff,
            admin,
            evidence_dir: tempfile::tempdir().expect("evidence dir"),
        }
    }

    pub fn clock_controller(&self) -> ClockController {
        ClockController::new(self.context.clone())
    }

    pub fn activity(&self) -> ActivityTracker {
        ActivityTracker::new(self.context.clone())
    }

    pub fn overtime(&self) -> OvertimeWorkflow {
        OvertimeWorkflow::new(self.context.clone())
    }

    pub fn geofence(&self) -> GeofenceMonitor {
        GeofenceMonitor::new(self.context.clone())
    }

    pub fn end_of_day(&self) -> EndOfDaySweeper {
        EndOfDaySweeper::new(self.context.clone())
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            test_config(),
            self.context.clone(),
            Arc::new(FsEvidenceStore::new(self.evidence_dir.path())),
        )
    }

    /// Point `metres` north of the branch.
    pub fn near_branch(&self, metres: f64) -> GeoPoint {
        offset_north(self.branch.location, metres)
    }

    pub fn advance(&self, minutes: i64) {
        self.clock.advance_minutes(minutes);
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn clock_in_staff(&self) -> AttendanceRecord {
        self.clock_controller()
            .clock_in(self.staff, self.near_branch(10.0), None)
            .await
            .expect("clock in")
    }

    pub async fn record(&self, record: &AttendanceRecord) -> AttendanceRecord {
        self.store
            .find_aggregate(record.id)
            .await
            .expect("load")
            .expect("record exists")
            .record
    }

    /// Waits for queued deliveries and returns everything delivered so far.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.context.notifier.wait_idle().await;
        self.sink.notifications()
    }

    pub async fn notifications_of(&self, kind: NotificationKind) -> Vec<Notification> {
        self.context.notifier.wait_idle().await;
        self.sink.of_kind(kind)
    }

    pub fn to_staff(&self) -> Recipient {
        Recipient::User(self.staff)
    }

    pub fn to_admins(&self) -> Recipient {
        Recipient::BranchAdmins(self.branch.id)
    }
}
