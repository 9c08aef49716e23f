//! Mutually exclusive sub-periods (break, prayer, outside work) within an
//! attendance record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::RejectionCode;
use crate::types::{ActivityPeriodId, AttendanceId};
use crate::utils::time::minutes_between;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Break,
    Prayer,
    OutsideWork,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Break => "break",
            PeriodType::Prayer => "prayer",
            PeriodType::OutsideWork => "outside_work",
        }
    }

    /// Code returned when this activity blocks a different one from starting.
    pub fn blocking_code(&self) -> RejectionCode {
        match self {
            PeriodType::Break => RejectionCode::OnBreak,
            PeriodType::Prayer => RejectionCode::AtPrayer,
            PeriodType::OutsideWork => RejectionCode::OnOutsideWork,
        }
    }

    pub fn requires_reason(&self) -> bool {
        matches!(self, PeriodType::OutsideWork)
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "break" => Ok(PeriodType::Break),
            "prayer" => Ok(PeriodType::Prayer),
            "outside_work" => Ok(PeriodType::OutsideWork),
            other => Err(anyhow::anyhow!("unknown period type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActivityPeriod {
    pub id: ActivityPeriodId,
    pub attendance_id: AttendanceId,
    pub period_type: PeriodType,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Filled when the period ends.
    pub duration_minutes: Option<i32>,
    pub reason: Option<String>,
    /// Set when the period was closed by the parent record closing.
    pub force_closed: bool,
}

impl ActivityPeriod {
    pub fn start(
        attendance_id: AttendanceId,
        period_type: PeriodType,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActivityPeriodId::new(),
            attendance_id,
            period_type,
            started_at: now,
            ended_at: None,
            duration_minutes: None,
            reason,
            force_closed: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Minutes elapsed so far for an open period, or the final duration.
    pub fn minutes_at(&self, now: DateTime<Utc>) -> i32 {
        match self.duration_minutes {
            Some(minutes) => minutes,
            None => minutes_between(self.started_at, now),
        }
    }

    /// Closes the period and returns its duration in minutes.
    pub fn finish(&mut self, now: DateTime<Utc>, forced: bool) -> i32 {
        let minutes = minutes_between(self.started_at, now);
        self.ended_at = Some(now);
        self.duration_minutes = Some(minutes);
        self.force_closed = forced;
        minutes
    }
}
