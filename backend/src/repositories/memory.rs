//! In-process attendance store.
//!
//! One mutex guards every table, so each `update_aggregate` call is
//! serialized against all other writers.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::error::{AppError, RejectionCode};
use crate::models::aggregate::AttendanceAggregate;
use crate::models::attendance::AttendanceRecord;
use crate::models::overtime_request::OvertimeRequest;
use crate::repositories::attendance_store::{AggregateUpdate, AttendanceStore};
use crate::types::{AttendanceId, BranchId, OvertimeRequestId, UserId};

#[derive(Debug, Default)]
struct Tables {
    aggregates: HashMap<AttendanceId, AttendanceAggregate>,
    reentry_grants: HashSet<(UserId, NaiveDate)>,
}

#[derive(Debug, Default)]
pub struct MemoryAttendanceStore {
    tables: Mutex<Tables>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn insert_open(
        &self,
        record: &AttendanceRecord,
        consume_grant: bool,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let already_open = tables
            .aggregates
            .values()
            .any(|agg| agg.record.user_id == record.user_id && agg.is_open());
        if already_open {
            return Err(AppError::rejected(
                RejectionCode::AlreadyOpen,
                "User already has an open attendance record",
            ));
        }
        if consume_grant
            && !tables
                .reentry_grants
                .remove(&(record.user_id, record.work_date))
        {
            return Err(AppError::rejected(
                RejectionCode::AlreadyClockedOut,
                "Already clocked out for this work date",
            ));
        }
        tables
            .aggregates
            .insert(record.id, AttendanceAggregate::new(record.clone()));
        Ok(())
    }

    async fn find_aggregate(
        &self,
        id: AttendanceId,
    ) -> Result<Option<AttendanceAggregate>, AppError> {
        Ok(self.tables.lock().await.aggregates.get(&id).cloned())
    }

    async fn find_open_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .aggregates
            .values()
            .find(|agg| agg.record.user_id == user_id && agg.is_open())
            .map(|agg| agg.record.clone()))
    }

    async fn find_latest_for_user_on(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .aggregates
            .values()
            .map(|agg| &agg.record)
            .filter(|r| r.user_id == user_id && r.work_date == work_date)
            .max_by_key(|r| r.clock_in_at)
            .cloned())
    }

    async fn list_open(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        let tables = self.tables.lock().await;
        let mut records: Vec<_> = tables
            .aggregates
            .values()
            .filter(|agg| agg.is_open())
            .map(|agg| agg.record.clone())
            .collect();
        records.sort_by_key(|r| r.clock_in_at);
        Ok(records)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let tables = self.tables.lock().await;
        let mut records: Vec<_> = tables
            .aggregates
            .values()
            .map(|agg| &agg.record)
            .filter(|r| r.user_id == user_id && r.work_date >= from && r.work_date <= to)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.clock_in_at.cmp(&a.clock_in_at));
        Ok(records)
    }

    async fn list_pending_overtime(
        &self,
        branch_id: Option<BranchId>,
    ) -> Result<Vec<OvertimeRequest>, AppError> {
        let tables = self.tables.lock().await;
        let mut requests: Vec<_> = tables
            .aggregates
            .values()
            .flat_map(|agg| agg.overtime_requests.iter())
            .filter(|r| r.is_pending())
            .filter(|r| branch_id.map_or(true, |b| r.branch_id == b))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.requested_at);
        Ok(requests)
    }

    async fn find_overtime_request(
        &self,
        id: OvertimeRequestId,
    ) -> Result<Option<OvertimeRequest>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .aggregates
            .values()
            .flat_map(|agg| agg.overtime_requests.iter())
            .find(|r| r.id == id)
            .cloned())
    }

    async fn update_aggregate(
        &self,
        id: AttendanceId,
        apply: &mut AggregateUpdate<'_>,
    ) -> Result<AttendanceAggregate, AppError> {
        let mut tables = self.tables.lock().await;
        let current = tables
            .aggregates
            .get(&id)
            .ok_or_else(|| AppError::NotFound("Attendance record not found".to_string()))?;
        let mut next = current.clone();
        apply(&mut next)?;
        if next != *current {
            tables.aggregates.insert(id, next.clone());
        }
        Ok(next)
    }

    async fn grant_reentry(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
        _granted_by: UserId,
        _now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.tables
            .lock()
            .await
            .reentry_grants
            .insert((user_id, work_date));
        Ok(())
    }

    async fn has_reentry_grant(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
    ) -> Result<bool, AppError> {
        Ok(self
            .tables
            .lock()
            .await
            .reentry_grants
            .contains(&(user_id, work_date)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance::NewAttendance;
    use crate::repositories::attendance_store::transition;
    use crate::utils::geo::GeoPoint;
    use chrono::TimeZone;

    fn record(user_id: UserId, work_date: NaiveDate) -> AttendanceRecord {
        AttendanceRecord::open(
            NewAttendance {
                user_id,
                branch_id: BranchId::new(),
                work_date,
                expected_minutes: 480,
                location: GeoPoint::new(24.7, 46.7),
                distance_m: 5.0,
                evidence: None,
                geofence_enabled: true,
                allow_reentry: false,
            },
            Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn insert_open_rejects_second_open_record() {
        let store = MemoryAttendanceStore::new();
        let user = UserId::new();
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        store.insert_open(&record(user, day), false).await.unwrap();

        let err = store
            .insert_open(&record(user, day), false)
            .await
            .unwrap_err();
        assert_eq!(err.rejection_code(), Some(RejectionCode::AlreadyOpen));
    }

    #[tokio::test]
    async fn reentry_grant_is_consumed_once() {
        let store = MemoryAttendanceStore::new();
        let user = UserId::new();
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let now = Utc::now();
        store.grant_reentry(user, day, UserId::new(), now).await.unwrap();
        assert!(store.has_reentry_grant(user, day).await.unwrap());

        store.insert_open(&record(user, day), true).await.unwrap();
        assert!(!store.has_reentry_grant(user, day).await.unwrap());
    }

    #[tokio::test]
    async fn failed_transition_leaves_aggregate_untouched() {
        let store = MemoryAttendanceStore::new();
        let rec = record(UserId::new(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        store.insert_open(&rec, false).await.unwrap();

        let result = transition(&store, rec.id, |agg| {
            agg.record.break_minutes = 99;
            Err::<(), _>(AppError::BadRequest("nope".into()))
        })
        .await;
        assert!(result.is_err());

        let stored = store.find_aggregate(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.record.break_minutes, 0);
    }
}
