//! An attendance record together with its child rows, and every guarded
//! transition that can be applied to it.
//!
//! Transitions are pure: they only look at the aggregate and the instant
//! they are given. The store runs them under a per-record lock, so each
//! guard ("only if still open", "only if no period open", "only if not yet
//! prompted") is checked against the persisted state.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, RejectionCode};
use crate::models::activity_period::{ActivityPeriod, PeriodType};
use crate::models::attendance::{AttendanceRecord, AttendanceState, CloseReason};
use crate::models::branch::BreakPolicy;
use crate::models::geofence_violation::{GeofenceViolation, ViolationResolution};
use crate::models::overtime_request::{OvertimeDecision, OvertimeRequest, OvertimeStatus};
use crate::types::{OvertimeRequestId, UserId};
use crate::utils::geo::GeoPoint;
use crate::utils::time::minutes_between;

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceAggregate {
    pub record: AttendanceRecord,
    pub periods: Vec<ActivityPeriod>,
    pub overtime_requests: Vec<OvertimeRequest>,
    pub violations: Vec<GeofenceViolation>,
}

/// Threshold crossed by a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAlert {
    Warning,
    Exceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodEnded {
    pub period: ActivityPeriod,
    pub alert: Option<BreakAlert>,
}

/// Totals fixed when a record closes.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSummary {
    pub reason: CloseReason,
    pub total_working_minutes: i32,
    pub overtime_minutes: i32,
    pub ot_approved_minutes: i32,
    pub forced_period: Option<PeriodType>,
    pub terminated_overtime: Option<OvertimeRequestId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceOutcome {
    /// Closed, geofence disabled, or exempt through an open period.
    Skipped,
    Inside,
    Cleared,
    ViolationOpened { distance_m: f64 },
    GraceRunning,
    AutoClosed(CloseSummary),
}

impl GeofenceOutcome {
    pub fn changed(&self) -> bool {
        matches!(
            self,
            GeofenceOutcome::Cleared
                | GeofenceOutcome::ViolationOpened { .. }
                | GeofenceOutcome::AutoClosed(_)
        )
    }
}

impl AttendanceAggregate {
    pub fn new(record: AttendanceRecord) -> Self {
        Self {
            record,
            periods: Vec::new(),
            overtime_requests: Vec::new(),
            violations: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.record.is_open()
    }

    pub fn open_period(&self) -> Option<&ActivityPeriod> {
        self.periods.iter().find(|p| p.is_open())
    }

    pub fn pending_overtime(&self) -> Option<&OvertimeRequest> {
        self.overtime_requests.iter().find(|r| r.is_pending())
    }

    /// Whether the staff member still owes a response to overtime: a request
    /// awaits a decision, or the latest one was rejected and the record was
    /// never closed.
    pub fn overtime_unresolved(&self) -> bool {
        self.pending_overtime().is_some()
            || self
                .overtime_requests
                .last()
                .is_some_and(|r| r.status == OvertimeStatus::Rejected)
    }

    pub fn approved_overtime(&self) -> Option<&OvertimeRequest> {
        self.overtime_requests.iter().find(|r| r.is_approved())
    }

    pub fn pending_violation(&self) -> Option<&GeofenceViolation> {
        self.violations.iter().find(|v| v.is_pending())
    }

    /// Net working minutes so far: elapsed time minus closed and running
    /// activity periods.
    pub fn worked_minutes(&self, now: DateTime<Utc>) -> i32 {
        let end = self.record.clock_out_at.unwrap_or(now);
        let running = self
            .open_period()
            .map(|p| p.minutes_at(now))
            .unwrap_or(0);
        minutes_between(self.record.clock_in_at, end)
            .saturating_sub(self.record.excluded_minutes())
            .saturating_sub(running)
            .max(0)
    }

    pub fn state(&self) -> AttendanceState {
        if !self.is_open() {
            return AttendanceState::ClockedOut;
        }
        match self.open_period().map(|p| p.period_type) {
            Some(PeriodType::Break) => AttendanceState::OnBreak,
            Some(PeriodType::Prayer) => AttendanceState::AtPrayer,
            Some(PeriodType::OutsideWork) => AttendanceState::OutsideWork,
            None if self.overtime_unresolved() => AttendanceState::OvertimePending,
            None => AttendanceState::Working,
        }
    }

    fn ensure_active(&self) -> Result<(), AppError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AppError::rejected(
                RejectionCode::NotActive,
                "Attendance record is already closed",
            ))
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.record.updated_at = now;
    }

    pub fn record_location(&mut self, location: GeoPoint, now: DateTime<Utc>) -> Result<(), AppError> {
        location.validate()?;
        self.ensure_active()?;
        self.record.last_location = location;
        self.record.last_location_at = now;
        self.touch(now);
        Ok(())
    }

    pub fn start_period(
        &mut self,
        period_type: PeriodType,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ActivityPeriod, AppError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if period_type.requires_reason() && reason.is_none() {
            return Err(AppError::rejected(
                RejectionCode::ReasonRequired,
                format!("A reason is required to start {}", period_type),
            ));
        }
        self.ensure_active()?;
        if let Some(open) = self.open_period() {
            return Err(if open.period_type == period_type {
                AppError::rejected(
                    RejectionCode::PeriodAlreadyOpen,
                    format!("A {} period is already open", period_type),
                )
            } else {
                AppError::rejected(
                    open.period_type.blocking_code(),
                    format!("Cannot start {} during {}", period_type, open.period_type),
                )
            });
        }

        // The record is exempt from monitoring while the period runs.
        if let Some(violation) = self.violations.iter_mut().find(|v| v.is_pending()) {
            violation.resolve(ViolationResolution::Cleared, now);
        }

        let period = ActivityPeriod::start(self.record.id, period_type, reason, now);
        self.periods.push(period.clone());
        self.touch(now);
        Ok(period)
    }

    pub fn end_period(
        &mut self,
        period_type: PeriodType,
        policy: BreakPolicy,
        now: DateTime<Utc>,
    ) -> Result<PeriodEnded, AppError> {
        let period = self
            .periods
            .iter_mut()
            .find(|p| p.is_open() && p.period_type == period_type)
            .ok_or_else(|| {
                AppError::rejected(
                    RejectionCode::NoOpenPeriod,
                    format!("No open {} period", period_type),
                )
            })?;
        let minutes = period.finish(now, false);
        let period = period.clone();
        self.record.add_period_minutes(period_type, minutes);

        let alert = if period_type == PeriodType::Break {
            self.recompute_excess_break(policy);
            self.take_break_alert(self.record.break_minutes, policy)
        } else {
            None
        };
        self.touch(now);
        Ok(PeriodEnded { period, alert })
    }

    /// Alert due for a break that is still running.
    pub fn check_break_alert(&mut self, policy: BreakPolicy, now: DateTime<Utc>) -> Option<BreakAlert> {
        if !self.is_open() {
            return None;
        }
        let running = self
            .open_period()
            .filter(|p| p.period_type == PeriodType::Break)?
            .minutes_at(now);
        let total = self.record.break_minutes.saturating_add(running);
        let alert = self.take_break_alert(total, policy);
        if alert.is_some() {
            self.touch(now);
        }
        alert
    }

    fn recompute_excess_break(&mut self, policy: BreakPolicy) {
        let excess = (self.record.break_minutes - policy.allowance_minutes).max(0);
        self.record.excess_break_minutes = excess;
        self.record.break_exceeded = excess > 0;
    }

    // Each alert fires at most once per record.
    fn take_break_alert(&mut self, total_break: i32, policy: BreakPolicy) -> Option<BreakAlert> {
        if total_break > policy.allowance_minutes {
            if self.record.break_exceeded_notified {
                return None;
            }
            self.record.break_exceeded_notified = true;
            self.record.break_warning_sent = true;
            return Some(BreakAlert::Exceeded);
        }
        if total_break >= policy.warning_minutes && !self.record.break_warning_sent {
            self.record.break_warning_sent = true;
            return Some(BreakAlert::Warning);
        }
        None
    }

    /// Closes the record if it is still open. Returns `None` when it was
    /// already closed, leaving it untouched.
    pub fn close(
        &mut self,
        reason: CloseReason,
        location: GeoPoint,
        distance_m: f64,
        evidence: Option<String>,
        policy: BreakPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<CloseSummary>, AppError> {
        if reason.is_open() {
            return Err(AppError::rejected(
                RejectionCode::InvalidCloseReason,
                "A close reason is required",
            ));
        }
        if !self.is_open() {
            return Ok(None);
        }

        let mut forced_period = None;
        if let Some(period) = self.periods.iter_mut().find(|p| p.is_open()) {
            let minutes = period.finish(now, true);
            let period_type = period.period_type;
            self.record.add_period_minutes(period_type, minutes);
            if period_type == PeriodType::Break {
                self.recompute_excess_break(policy);
            }
            forced_period = Some(period_type);
        }

        let mut terminated_overtime = None;
        if let Some(request) = self.overtime_requests.iter_mut().find(|r| r.is_pending()) {
            let status = if reason == CloseReason::OtTimeout {
                OvertimeStatus::AutoClockout
            } else {
                OvertimeStatus::Expired
            };
            request.terminate(status, now);
            terminated_overtime = Some(request.id);
        }

        if let Some(violation) = self.violations.iter_mut().find(|v| v.is_pending()) {
            let resolution = if reason == CloseReason::Geofence {
                ViolationResolution::AutoClockout
            } else {
                ViolationResolution::Cleared
            };
            violation.resolve(resolution, now);
        }

        let elapsed = minutes_between(self.record.clock_in_at, now);
        let total = elapsed.saturating_sub(self.record.excluded_minutes()).max(0);
        let overtime = (total - self.record.expected_minutes).max(0);
        let approved = self
            .approved_overtime()
            .map(|r| r.approved_minutes.unwrap_or(overtime).clamp(0, overtime))
            .unwrap_or(0);

        let record = &mut self.record;
        record.total_working_minutes = total;
        record.overtime_minutes = overtime;
        record.ot_approved_minutes = approved;
        record.clock_out_at = Some(now);
        record.clock_out_location = Some(location);
        record.clock_out_distance_m = Some(distance_m);
        record.clock_out_evidence = evidence;
        record.close_reason = reason;
        record.close_distance_m = Some(distance_m);
        self.touch(now);

        Ok(Some(CloseSummary {
            reason,
            total_working_minutes: total,
            overtime_minutes: overtime,
            ot_approved_minutes: approved,
            forced_period,
            terminated_overtime,
        }))
    }

    /// Marks the overtime prompt as shown once working time reaches the
    /// expected minutes. Returns true only the first time.
    pub fn mark_overtime_prompt(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_open() || self.record.ot_prompt_shown_at.is_some() {
            return false;
        }
        if self.worked_minutes(now) < self.record.expected_minutes {
            return false;
        }
        self.record.ot_prompt_shown_at = Some(now);
        self.touch(now);
        true
    }

    pub fn request_overtime(
        &mut self,
        reason: &str,
        auto_approve: bool,
        now: DateTime<Utc>,
    ) -> Result<OvertimeRequest, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::rejected(
                RejectionCode::ReasonRequired,
                "A reason is required for overtime",
            ));
        }
        self.ensure_active()?;
        if self.pending_overtime().is_some() {
            return Err(AppError::rejected(
                RejectionCode::OvertimePending,
                "An overtime request is already pending",
            ));
        }
        if self.approved_overtime().is_some() {
            return Err(AppError::rejected(
                RejectionCode::OvertimeAlreadyApproved,
                "Overtime is already approved for this record",
            ));
        }
        let worked = self.worked_minutes(now);
        if worked < self.record.expected_minutes {
            return Err(AppError::rejected(
                RejectionCode::OvertimeNotReached,
                format!(
                    "Worked {} of {} expected minutes",
                    worked, self.record.expected_minutes
                ),
            ));
        }

        let mut request = OvertimeRequest::new(
            self.record.id,
            self.record.user_id,
            self.record.branch_id,
            reason.to_string(),
            now,
        );
        if auto_approve {
            request.approve(Some(worked - self.record.expected_minutes), None, now);
        }
        self.record.ot_request_id = Some(request.id);
        self.overtime_requests.push(request.clone());
        self.touch(now);
        Ok(request)
    }

    pub fn decide_overtime(
        &mut self,
        request_id: OvertimeRequestId,
        decision: OvertimeDecision,
        approved_minutes: Option<i32>,
        note: Option<String>,
        decided_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<OvertimeRequest, AppError> {
        let request = self
            .overtime_requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| AppError::NotFound("Overtime request not found".to_string()))?;
        if !request.is_pending() {
            return Err(AppError::rejected(
                RejectionCode::RequestNotPending,
                format!("Overtime request is already {}", request.status.as_str()),
            ));
        }
        match decision {
            OvertimeDecision::Approve => request.approve(approved_minutes, Some(decided_by), now),
            OvertimeDecision::Reject => request.reject(decided_by, now),
        }
        request.decision_note = note;
        let request = request.clone();
        self.touch(now);
        Ok(request)
    }

    /// True when the pending request has waited at least `timeout_minutes`.
    pub fn overtime_timed_out(&self, timeout_minutes: i32, now: DateTime<Utc>) -> bool {
        self.is_open()
            && self
                .pending_overtime()
                .is_some_and(|r| now - r.requested_at >= Duration::minutes(timeout_minutes.into()))
    }

    /// One geofence evaluation against the latest known distance.
    pub fn evaluate_geofence(
        &mut self,
        distance_m: f64,
        radius_m: f64,
        grace: Duration,
        policy: BreakPolicy,
        now: DateTime<Utc>,
    ) -> Result<GeofenceOutcome, AppError> {
        if !self.is_open() || !self.record.geofence_enabled || self.open_period().is_some() {
            return Ok(GeofenceOutcome::Skipped);
        }
        if !distance_m.is_finite() {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "non-finite distance for attendance {}",
                self.record.id
            )));
        }

        if distance_m <= radius_m {
            return Ok(match self.violations.iter_mut().find(|v| v.is_pending()) {
                Some(violation) => {
                    violation.resolve(ViolationResolution::Cleared, now);
                    self.touch(now);
                    GeofenceOutcome::Cleared
                }
                None => GeofenceOutcome::Inside,
            });
        }

        let detected_at = match self.pending_violation() {
            Some(violation) => violation.detected_at,
            None => {
                self.violations
                    .push(GeofenceViolation::detect(self.record.id, distance_m, now));
                self.touch(now);
                return Ok(GeofenceOutcome::ViolationOpened { distance_m });
            }
        };
        if now - detected_at < grace {
            return Ok(GeofenceOutcome::GraceRunning);
        }

        let location = self.record.last_location;
        match self.close(CloseReason::Geofence, location, distance_m, None, policy, now)? {
            Some(summary) => Ok(GeofenceOutcome::AutoClosed(summary)),
            None => Ok(GeofenceOutcome::Skipped),
        }
    }
}
