use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BranchId, UserId};

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    /// Every admin of the branch.
    BranchAdmins(BranchId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OvertimePrompt,
    OvertimeRequested,
    OvertimeApproved,
    OvertimeRejected,
    OvertimeAutoClockout,
    GeofenceWarning,
    GeofenceAutoClockout,
    BreakWarning,
    BreakExceeded,
    EndOfDayClockout,
    EndOfDaySummary,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OvertimePrompt => "overtime_prompt",
            NotificationKind::OvertimeRequested => "overtime_requested",
            NotificationKind::OvertimeApproved => "overtime_approved",
            NotificationKind::OvertimeRejected => "overtime_rejected",
            NotificationKind::OvertimeAutoClockout => "overtime_auto_clockout",
            NotificationKind::GeofenceWarning => "geofence_warning",
            NotificationKind::GeofenceAutoClockout => "geofence_auto_clockout",
            NotificationKind::BreakWarning => "break_warning",
            NotificationKind::BreakExceeded => "break_exceeded",
            NotificationKind::EndOfDayClockout => "end_of_day_clockout",
            NotificationKind::EndOfDaySummary => "end_of_day_summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: Recipient,
        kind: NotificationKind,
        payload: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            recipient,
            kind,
            payload,
            created_at,
        }
    }
}
