use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::activity_period::{ActivityPeriod, PeriodType};
use crate::models::overtime_request::OvertimeRequest;
use crate::types::{AttendanceId, BranchId, OvertimeRequestId, UserId};
use crate::utils::geo::GeoPoint;

/// One user's presence on one work day.
///
/// `clock_out_at` is set exactly when `close_reason` is not `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub user_id: UserId,
    pub branch_id: BranchId,
    pub work_date: NaiveDate,
    pub clock_in_at: DateTime<Utc>,
    pub clock_out_at: Option<DateTime<Utc>>,
    /// Frozen from the shop configuration at clock-in.
    pub expected_minutes: i32,
    pub clock_in_location: GeoPoint,
    pub clock_in_distance_m: f64,
    pub clock_in_evidence: Option<String>,
    pub clock_out_location: Option<GeoPoint>,
    pub clock_out_distance_m: Option<f64>,
    pub clock_out_evidence: Option<String>,
    pub last_location: GeoPoint,
    pub last_location_at: DateTime<Utc>,
    pub total_working_minutes: i32,
    pub break_minutes: i32,
    pub prayer_minutes: i32,
    pub outside_work_minutes: i32,
    pub excess_break_minutes: i32,
    /// Raw overtime, kept for audit and reporting.
    pub overtime_minutes: i32,
    /// Payable overtime.
    pub ot_approved_minutes: i32,
    pub geofence_enabled: bool,
    pub break_exceeded: bool,
    pub break_warning_sent: bool,
    pub break_exceeded_notified: bool,
    pub allow_reentry: bool,
    pub ot_request_id: Option<OvertimeRequestId>,
    pub ot_prompt_shown_at: Option<DateTime<Utc>>,
    pub close_reason: CloseReason,
    pub close_distance_m: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Record is still open.
    None,
    Manual,
    Geofence,
    MaxHours,
    Admin,
    EndOfDay,
    OtTimeout,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::None => "none",
            CloseReason::Manual => "manual",
            CloseReason::Geofence => "geofence",
            CloseReason::MaxHours => "max_hours",
            CloseReason::Admin => "admin",
            CloseReason::EndOfDay => "end_of_day",
            CloseReason::OtTimeout => "ot_timeout",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, CloseReason::None)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloseReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CloseReason::None),
            "manual" => Ok(CloseReason::Manual),
            "geofence" => Ok(CloseReason::Geofence),
            "max_hours" => Ok(CloseReason::MaxHours),
            "admin" => Ok(CloseReason::Admin),
            "end_of_day" => Ok(CloseReason::EndOfDay),
            "ot_timeout" => Ok(CloseReason::OtTimeout),
            other => Err(anyhow::anyhow!("unknown close reason: {}", other)),
        }
    }
}

/// Fields needed to open a new record.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub user_id: UserId,
    pub branch_id: BranchId,
    pub work_date: NaiveDate,
    pub expected_minutes: i32,
    pub location: GeoPoint,
    pub distance_m: f64,
    pub evidence: Option<String>,
    pub geofence_enabled: bool,
    pub allow_reentry: bool,
}

impl AttendanceRecord {
    pub fn open(new: NewAttendance, now: DateTime<Utc>) -> Self {
        Self {
            id: AttendanceId::new(),
            user_id: new.user_id,
            branch_id: new.branch_id,
            work_date: new.work_date,
            clock_in_at: now,
            clock_out_at: None,
            expected_minutes: new.expected_minutes,
            clock_in_location: new.location,
            clock_in_distance_m: new.distance_m,
            clock_in_evidence: new.evidence,
            clock_out_location: None,
            clock_out_distance_m: None,
            clock_out_evidence: None,
            last_location: new.location,
            last_location_at: now,
            total_working_minutes: 0,
            break_minutes: 0,
            prayer_minutes: 0,
            outside_work_minutes: 0,
            excess_break_minutes: 0,
            overtime_minutes: 0,
            ot_approved_minutes: 0,
            geofence_enabled: new.geofence_enabled,
            break_exceeded: false,
            break_warning_sent: false,
            break_exceeded_notified: false,
            allow_reentry: new.allow_reentry,
            ot_request_id: None,
            ot_prompt_shown_at: None,
            close_reason: CloseReason::None,
            close_distance_m: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.close_reason.is_open()
    }

    pub(crate) fn add_period_minutes(&mut self, period_type: PeriodType, minutes: i32) {
        let counter = match period_type {
            PeriodType::Break => &mut self.break_minutes,
            PeriodType::Prayer => &mut self.prayer_minutes,
            PeriodType::OutsideWork => &mut self.outside_work_minutes,
        };
        *counter = counter.saturating_add(minutes);
    }

    /// Minutes spent in closed activity periods.
    pub fn excluded_minutes(&self) -> i32 {
        self.break_minutes
            .saturating_add(self.prayer_minutes)
            .saturating_add(self.outside_work_minutes)
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ClockInRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Optional base64-encoded photo kept as evidence.
    pub photo_base64: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ClockOutRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub photo_base64: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LocationReport {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct StartPeriodRequest {
    /// Defaults to the caller's open record.
    pub attendance_id: Option<AttendanceId>,
    pub period_type: PeriodType,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EndPeriodRequest {
    pub attendance_id: Option<AttendanceId>,
    pub period_type: PeriodType,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminCloseRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReentryGrantRequest {
    pub user_id: UserId,
    pub work_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttendanceStatusResponse {
    pub status: AttendanceState,
    pub record: Option<AttendanceRecord>,
    pub open_period: Option<ActivityPeriod>,
    pub pending_overtime: Option<OvertimeRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceState {
    NotStarted,
    Working,
    OnBreak,
    AtPrayer,
    OutsideWork,
    OvertimePending,
    ClockedOut,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttendanceDetailResponse {
    pub record: AttendanceRecord,
    pub periods: Vec<ActivityPeriod>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_reason_serde_snake_case() {
        let r: CloseReason = serde_json::from_str("\"end_of_day\"").unwrap();
        assert_eq!(r, CloseReason::EndOfDay);
        let v = serde_json::to_value(CloseReason::OtTimeout).unwrap();
        assert_eq!(v, serde_json::json!("ot_timeout"));
        assert_eq!("none".parse::<CloseReason>().unwrap(), CloseReason::None);
    }

    #[test]
    fn clock_in_payload_validates_ranges() {
        let payload = ClockInRequest {
            latitude: 95.0,
            longitude: 10.0,
            photo_base64: None,
        };
        assert!(payload.validate().is_err());
        let payload = ClockInRequest {
            latitude: 24.0,
            longitude: 46.0,
            photo_base64: None,
        };
        assert!(payload.validate().is_ok());
    }
}
