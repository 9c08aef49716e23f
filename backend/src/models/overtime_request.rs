use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{AttendanceId, BranchId, OvertimeRequestId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OvertimeRequest {
    pub id: OvertimeRequestId,
    pub attendance_id: AttendanceId,
    pub user_id: UserId,
    pub branch_id: BranchId,
    pub status: OvertimeStatus,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    /// Minutes the approver agreed to pay; `None` on approval means "all
    /// observed overtime".
    pub approved_minutes: Option<i32>,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OvertimeStatus {
    Pending,
    Approved,
    Rejected,
    AutoClockout,
    Expired,
}

impl OvertimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OvertimeStatus::Pending => "pending",
            OvertimeStatus::Approved => "approved",
            OvertimeStatus::Rejected => "rejected",
            OvertimeStatus::AutoClockout => "auto_clockout",
            OvertimeStatus::Expired => "expired",
        }
    }
}

impl FromStr for OvertimeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OvertimeStatus::Pending),
            "approved" => Ok(OvertimeStatus::Approved),
            "rejected" => Ok(OvertimeStatus::Rejected),
            "auto_clockout" => Ok(OvertimeStatus::AutoClockout),
            "expired" => Ok(OvertimeStatus::Expired),
            other => Err(anyhow::anyhow!("unknown overtime status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OvertimeDecision {
    Approve,
    Reject,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOvertimeRequest {
    /// Defaults to the caller's open record.
    pub attendance_id: Option<AttendanceId>,
    #[validate(length(max = 500))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct DecideOvertimeRequest {
    pub decision: OvertimeDecision,
    #[validate(range(min = 0, max = 1440))]
    pub approved_minutes: Option<i32>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl OvertimeRequest {
    pub fn new(
        attendance_id: AttendanceId,
        user_id: UserId,
        branch_id: BranchId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OvertimeRequestId::new(),
            attendance_id,
            user_id,
            branch_id,
            status: OvertimeStatus::Pending,
            reason,
            requested_at: now,
            approved_minutes: None,
            decided_by: None,
            decided_at: None,
            decision_note: None,
        }
    }

    pub fn approve(
        &mut self,
        approved_minutes: Option<i32>,
        decided_by: Option<UserId>,
        now: DateTime<Utc>,
    ) {
        self.status = OvertimeStatus::Approved;
        self.approved_minutes = approved_minutes;
        self.decided_by = decided_by;
        self.decided_at = Some(now);
    }

    pub fn reject(&mut self, decided_by: UserId, now: DateTime<Utc>) {
        self.status = OvertimeStatus::Rejected;
        self.decided_by = Some(decided_by);
        self.decided_at = Some(now);
    }

    /// Terminates a pending request without an admin decision.
    pub fn terminate(&mut self, status: OvertimeStatus, now: DateTime<Utc>) {
        self.status = status;
        self.decided_at = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, OvertimeStatus::Pending)
    }

    pub fn is_approved(&self) -> bool {
        matches!(self.status, OvertimeStatus::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overtime_status_serde_snake_case() {
        let s: OvertimeStatus = serde_json::from_str("\"auto_clockout\"").unwrap();
        assert_eq!(s, OvertimeStatus::AutoClockout);
        let v = serde_json::to_value(OvertimeStatus::Pending).unwrap();
        assert_eq!(v, serde_json::json!("pending"));
        assert_eq!("expired".parse::<OvertimeStatus>().unwrap(), OvertimeStatus::Expired);
    }

    #[test]
    fn decision_payload_rejects_negative_minutes() {
        let payload = DecideOvertimeRequest {
            decision: OvertimeDecision::Approve,
            approved_minutes: Some(-5),
            note: None,
        };
        assert!(payload.validate().is_err());
    }
}
