//! Storage contract for attendance records and their child rows.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AppError;
use crate::models::aggregate::AttendanceAggregate;
use crate::models::attendance::AttendanceRecord;
use crate::models::overtime_request::OvertimeRequest;
use crate::types::{AttendanceId, BranchId, OvertimeRequestId, UserId};

/// Mutation applied to a locked aggregate.
pub type AggregateUpdate<'a> =
    dyn FnMut(&mut AttendanceAggregate) -> Result<(), AppError> + Send + 'a;

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Persists a freshly opened record.
    ///
    /// Fails `ALREADY_OPEN` when the user already has an open record. With
    /// `consume_grant`, a re-entry grant for the record's work date is used
    /// up in the same step, failing `ALREADY_CLOCKED_OUT` if there is none.
    async fn insert_open(
        &self,
        record: &AttendanceRecord,
        consume_grant: bool,
    ) -> Result<(), AppError>;

    async fn find_aggregate(
        &self,
        id: AttendanceId,
    ) -> Result<Option<AttendanceAggregate>, AppError>;

    async fn find_open_for_user(&self, user_id: UserId)
        -> Result<Option<AttendanceRecord>, AppError>;

    /// Most recent record of the user on `work_date`, open or closed.
    async fn find_latest_for_user_on(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AppError>;

    async fn list_open(&self) -> Result<Vec<AttendanceRecord>, AppError>;

    async fn list_for_user(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError>;

    async fn list_pending_overtime(
        &self,
        branch_id: Option<BranchId>,
    ) -> Result<Vec<OvertimeRequest>, AppError>;

    async fn find_overtime_request(
        &self,
        id: OvertimeRequestId,
    ) -> Result<Option<OvertimeRequest>, AppError>;

    /// Locks the record, runs `apply` on its aggregate and persists the
    /// result only if `apply` succeeded and changed something.
    async fn update_aggregate(
        &self,
        id: AttendanceId,
        apply: &mut AggregateUpdate<'_>,
    ) -> Result<AttendanceAggregate, AppError>;

    async fn grant_reentry(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
        granted_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn has_reentry_grant(&self, user_id: UserId, work_date: NaiveDate)
        -> Result<bool, AppError>;
}

/// Runs one guarded transition and hands back its output with the
/// resulting aggregate.
pub async fn transition<S, T, F>(
    store: &S,
    id: AttendanceId,
    mut f: F,
) -> Result<(AttendanceAggregate, T), AppError>
where
    S: AttendanceStore + ?Sized,
    T: Send,
    F: FnMut(&mut AttendanceAggregate) -> Result<T, AppError> + Send,
{
    let mut output = None;
    let aggregate = store
        .update_aggregate(id, &mut |agg: &mut AttendanceAggregate| {
            output = Some(f(agg)?);
            Ok(())
        })
        .await?;
    let output = output.ok_or_else(|| {
        AppError::InternalServerError(anyhow::anyhow!("transition on {} did not run", id))
    })?;
    Ok((aggregate, output))
}
