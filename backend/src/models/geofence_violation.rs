use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::types::{AttendanceId, GeofenceViolationId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeofenceViolation {
    pub id: GeofenceViolationId,
    pub attendance_id: AttendanceId,
    pub detected_at: DateTime<Utc>,
    pub distance_m: f64,
    pub resolution: ViolationResolution,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationResolution {
    /// Unresolved: the grace window is running.
    GracePeriod,
    Cleared,
    AutoClockout,
}

impl ViolationResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationResolution::GracePeriod => "grace_period",
            ViolationResolution::Cleared => "cleared",
            ViolationResolution::AutoClockout => "auto_clockout",
        }
    }
}

impl FromStr for ViolationResolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grace_period" => Ok(ViolationResolution::GracePeriod),
            "cleared" => Ok(ViolationResolution::Cleared),
            "auto_clockout" => Ok(ViolationResolution::AutoClockout),
            other => Err(anyhow::anyhow!("unknown violation resolution: {}", other)),
        }
    }
}

impl GeofenceViolation {
    pub fn detect(attendance_id: AttendanceId, distance_m: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: GeofenceViolationId::new(),
            attendance_id,
            detected_at: now,
            distance_m,
            resolution: ViolationResolution::GracePeriod,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.resolution, ViolationResolution::GracePeriod)
    }

    pub fn resolve(&mut self, resolution: ViolationResolution, now: DateTime<Utc>) {
        self.resolution = resolution;
        self.resolved_at = Some(now);
    }
}
