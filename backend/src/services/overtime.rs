//! Overtime prompt, request, decision and timeout.

use serde_json::json;

use crate::error::AppError;
use crate::models::attendance::{AttendanceRecord, CloseReason};
use crate::models::overtime_request::{DecideOvertimeRequest, OvertimeDecision, OvertimeRequest};
use crate::models::notification::{NotificationKind, Recipient};
use crate::repositories::transition;
use crate::services::CoreContext;
use crate::types::{AttendanceId, BranchId, OvertimeRequestId, UserId};
use crate::utils::time::minutes_between;

#[derive(Clone)]
pub struct OvertimeWorkflow {
    ctx: CoreContext,
}

impl OvertimeWorkflow {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Prompt driver: sends the one-time prompt to every open record that
    /// reached its expected minutes. Returns the number of prompts sent.
    pub async fn run_prompts(&self) -> usize {
        let open = match self.ctx.store.list_open().await {
            Ok(open) => open,
            Err(err) => {
                tracing::error!(error = %err, "Overtime prompt driver could not list open records");
                return 0;
            }
        };

        let now = self.ctx.clock.now();
        let mut prompted = 0;
        // Elapsed time bounds worked time from above.
        let candidates = open.into_iter().filter(|r| {
            r.ot_prompt_shown_at.is_none()
                && minutes_between(r.clock_in_at, now) >= r.expected_minutes
        });
        for record in candidates {
            match self.prompt(&record).await {
                Ok(true) => prompted += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(
                    attendance_id = %record.id,
                    driver = "overtime_prompt",
                    error = %err,
                    "Skipping record"
                ),
            }
        }
        tracing::debug!(prompted, "Overtime prompt tick finished");
        prompted
    }

    async fn prompt(&self, record: &AttendanceRecord) -> Result<bool, AppError> {
        let now = self.ctx.clock.now();
        let (aggregate, marked) = transition(self.ctx.store.as_ref(), record.id, |agg| {
            Ok(agg.mark_overtime_prompt(now))
        })
        .await?;
        if marked {
            tracing::info!(attendance_id = %record.id, user_id = %record.user_id, "Overtime prompt sent");
            self.ctx.notifier.notify(
                Recipient::User(record.user_id),
                NotificationKind::OvertimePrompt,
                json!({
                    "attendance_id": record.id,
                    "expected_minutes": record.expected_minutes,
                    "worked_minutes": aggregate.worked_minutes(now),
                }),
            );
        }
        Ok(marked)
    }

    pub async fn request(
        &self,
        attendance_id: AttendanceId,
        reason: &str,
    ) -> Result<OvertimeRequest, AppError> {
        let snapshot = self.ctx.load(attendance_id).await?;
        let shop = self
            .ctx
            .shop_config(snapshot.record.branch_id, snapshot.record.work_date)
            .await?;
        let auto_approve = !shop.ot_approval_required;
        let now = self.ctx.clock.now();

        let (aggregate, request) = transition(self.ctx.store.as_ref(), attendance_id, |agg| {
            agg.request_overtime(reason, auto_approve, now)
        })
        .await?;
        let record = &aggregate.record;
        tracing::info!(
            attendance_id = %attendance_id,
            overtime_request_id = %request.id,
            status = request.status.as_str(),
            "Overtime requested"
        );

        if request.is_approved() {
            self.ctx.notifier.notify(
                Recipient::User(record.user_id),
                NotificationKind::OvertimeApproved,
                json!({
                    "overtime_request_id": request.id,
                    "approved_minutes": request.approved_minutes,
                    "automatic": true,
                }),
            );
        } else {
            self.ctx.notifier.notify(
                Recipient::BranchAdmins(record.branch_id),
                NotificationKind::OvertimeRequested,
                json!({
                    "overtime_request_id": request.id,
                    "attendance_id": attendance_id,
                    "user_id": record.user_id,
                    "reason": request.reason,
                }),
            );
        }
        Ok(request)
    }

    pub async fn decide(
        &self,
        request_id: OvertimeRequestId,
        decision: &DecideOvertimeRequest,
        admin_id: UserId,
    ) -> Result<OvertimeRequest, AppError> {
        let existing = self
            .ctx
            .store
            .find_overtime_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Overtime request not found".to_string()))?;
        let now = self.ctx.clock.now();

        let (_, request) = transition(self.ctx.store.as_ref(), existing.attendance_id, |agg| {
            agg.decide_overtime(
                request_id,
                decision.decision,
                decision.approved_minutes,
                decision.note.clone(),
                admin_id,
                now,
            )
        })
        .await?;
        tracing::info!(
            overtime_request_id = %request_id,
            admin_id = %admin_id,
            status = request.status.as_str(),
            "Overtime decided"
        );

        let (kind, payload) = match decision.decision {
            OvertimeDecision::Approve => (
                NotificationKind::OvertimeApproved,
                json!({
                    "overtime_request_id": request.id,
                    "approved_minutes": request.approved_minutes,
                    "automatic": false,
                }),
            ),
            OvertimeDecision::Reject => (
                NotificationKind::OvertimeRejected,
                json!({
                    "overtime_request_id": request.id,
                    "note": request.decision_note,
                    "action": "clock_out",
                }),
            ),
        };
        self.ctx
            .notifier
            .notify(Recipient::User(request.user_id), kind, payload);
        Ok(request)
    }

    /// Timeout driver: closes records whose pending request outlived the
    /// branch timeout. Returns the number of records closed.
    pub async fn run_timeouts(&self) -> usize {
        let pending = match self.ctx.store.list_pending_overtime(None).await {
            Ok(pending) => pending,
            Err(err) => {
                tracing::error!(error = %err, "Overtime timeout driver could not list requests");
                return 0;
            }
        };

        let mut closed = 0;
        for request in pending {
            match self.expire(&request).await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(
                    attendance_id = %request.attendance_id,
                    overtime_request_id = %request.id,
                    driver = "overtime_timeout",
                    error = %err,
                    "Skipping request"
                ),
            }
        }
        tracing::debug!(closed, "Overtime timeout tick finished");
        closed
    }

    async fn expire(&self, request: &OvertimeRequest) -> Result<bool, AppError> {
        let snapshot = self.ctx.load(request.attendance_id).await?;
        let timeout = self
            .ctx
            .shop_config(snapshot.record.branch_id, snapshot.record.work_date)
            .await?
            .ot_timeout_minutes;
        let now = self.ctx.clock.now();
        if !snapshot.overtime_timed_out(timeout, now) {
            return Ok(false);
        }

        let (aggregate, summary) = self
            .ctx
            .close_if(
                request.attendance_id,
                CloseReason::OtTimeout,
                None,
                None,
                move |agg| agg.overtime_timed_out(timeout, now),
            )
            .await?;
        let Some(summary) = summary else {
            return Ok(false);
        };

        let record = &aggregate.record;
        tracing::info!(
            attendance_id = %record.id,
            user_id = %record.user_id,
            close_reason = %summary.reason,
            "Attendance auto-closed"
        );
        let payload = json!({
            "attendance_id": record.id,
            "user_id": record.user_id,
            "overtime_request_id": request.id,
            "timeout_minutes": timeout,
        });
        self.ctx.notifier.notify(
            Recipient::User(record.user_id),
            NotificationKind::OvertimeAutoClockout,
            payload.clone(),
        );
        self.ctx.notifier.notify(
            Recipient::BranchAdmins(record.branch_id),
            NotificationKind::OvertimeAutoClockout,
            payload,
        );
        Ok(true)
    }

    pub async fn list_pending(
        &self,
        branch_id: Option<BranchId>,
    ) -> Result<Vec<OvertimeRequest>, AppError> {
        self.ctx.store.list_pending_overtime(branch_id).await
    }
}
