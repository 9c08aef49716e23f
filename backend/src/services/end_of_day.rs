//! Forced close of records still open at the branch-local day cutoff.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::json;
use std::collections::BTreeMap;

use crate::error::AppError;
use crate::models::attendance::{AttendanceRecord, CloseReason};
use crate::models::notification::{NotificationKind, Recipient};
use crate::services::CoreContext;
use crate::types::BranchId;
use crate::utils::time::local_instant;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EndOfDayReport {
    pub closed: usize,
    pub failed: usize,
    /// Records closed per branch in this pass.
    pub per_branch: BTreeMap<BranchId, usize>,
}

#[derive(Clone)]
pub struct EndOfDaySweeper {
    ctx: CoreContext,
}

impl EndOfDaySweeper {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Closes every open record whose cutoff has passed. Running it twice
    /// closes nothing the second time.
    pub async fn run_once(&self) -> Result<EndOfDayReport, AppError> {
        let open = self.ctx.store.list_open().await?;
        let mut report = EndOfDayReport::default();

        for record in open {
            match self.sweep(&record).await {
                Ok(true) => {
                    report.closed += 1;
                    *report.per_branch.entry(record.branch_id).or_default() += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        attendance_id = %record.id,
                        driver = "end_of_day",
                        error = %err,
                        "Skipping record"
                    );
                }
            }
        }

        for (branch_id, closed) in &report.per_branch {
            self.ctx.notifier.notify(
                Recipient::BranchAdmins(*branch_id),
                NotificationKind::EndOfDaySummary,
                json!({ "branch_id": branch_id, "closed": closed }),
            );
        }
        tracing::info!(
            closed = report.closed,
            failed = report.failed,
            "End-of-day sweep finished"
        );
        Ok(report)
    }

    /// First cutoff after clock-in. A record opened past its work date's
    /// cutoff was not open at that moment and waits for the next day's.
    fn cutoff_for(&self, record: &AttendanceRecord, tz: &Tz) -> DateTime<Utc> {
        let time = self.ctx.settings.end_of_day_cutoff;
        let same_day = local_instant(record.work_date, time, tz);
        if record.clock_in_at < same_day {
            return same_day;
        }
        let next_day = record.work_date.succ_opt().unwrap_or(record.work_date);
        local_instant(next_day, time, tz)
    }

    async fn sweep(&self, record: &AttendanceRecord) -> Result<bool, AppError> {
        let branch = self.ctx.branch(record.branch_id).await?;
        let cutoff = self.cutoff_for(record, &branch.time_zone);
        if self.ctx.clock.now() < cutoff {
            return Ok(false);
        }

        let (aggregate, summary) = self
            .ctx
            .close(record.id, CloseReason::EndOfDay, None, None)
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
        self.ctx.notifier.notify(
            Recipient::User(record.user_id),
            NotificationKind::EndOfDayClockout,
            json!({
                "attendance_id": record.id,
                "work_date": record.work_date,
                "total_working_minutes": summary.total_working_minutes,
            }),
        );
        Ok(true)
    }
}
