//! Read-only branch configuration consumed by the presence engine.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::types::BranchId;
use crate::utils::geo::GeoPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub location: GeoPoint,
    /// Zone that defines the branch's work calendar day.
    pub time_zone: Tz,
}

/// Per-branch, per-weekday shop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub expected_minutes: i32,
    pub geofence_radius_m: f64,
    pub break_allowance_minutes: i32,
    pub break_warning_minutes: i32,
    pub ot_timeout_minutes: i32,
    pub ot_approval_required: bool,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            expected_minutes: 480,
            geofence_radius_m: 100.0,
            break_allowance_minutes: 60,
            break_warning_minutes: 45,
            ot_timeout_minutes: 15,
            ot_approval_required: true,
        }
    }
}

impl ShopConfig {
    pub fn break_policy(&self) -> BreakPolicy {
        BreakPolicy {
            allowance_minutes: self.break_allowance_minutes,
            warning_minutes: self.break_warning_minutes,
        }
    }
}

/// Break thresholds applied to one attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakPolicy {
    pub allowance_minutes: i32,
    pub warning_minutes: i32,
}

impl Default for BreakPolicy {
    fn default() -> Self {
        ShopConfig::default().break_policy()
    }
}
