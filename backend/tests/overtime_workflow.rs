use presence_backend::{
    error::{AppError, RejectionCode},
    models::{
        attendance::{AttendanceState, CloseReason},
        branch::ShopConfig,
        notification::NotificationKind,
        overtime_request::{DecideOvertimeRequest, OvertimeDecision, OvertimeStatus},
    },
    repositories::AttendanceStore,
    types::OvertimeRequestId,
};

mod support;

use support::Harness;

fn decision(decision: OvertimeDecision, approved_minutes: Option<i32>) -> DecideOvertimeRequest {
    DecideOvertimeRequest {
        decision,
        approved_minutes,
        note: None,
    }
}

#[tokio::test]
async fn prompt_request_approve_and_close_pays_approved_minutes() {
    let h = Harness::new();
    let record = h.clock_in_staff().await;
    let overtime = h.overtime();

    h.advance(479);
    assert_eq!(overtime.run_prompts().await, 0);
    h.advance(1);
    assert_eq!(overtime.run_prompts().await, 1);
    h.advance(1);
    assert_eq!(overtime.run_prompts().await, 0);

    let prompts = h.notifications_of(NotificationKind::OvertimePrompt).await;
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].recipient, h.to_staff());
    assert!(h.record(&record).await.ot_prompt_shown_at.is_some());

    h.advance(4);
    let request = overtime.request(record.id, "month-end stock count").await.unwrap();
    assert_eq!(request.status, OvertimeStatus::Pending);
    assert_eq!(
        h.clock_controller().status(h.staff).await.unwrap().status,
        AttendanceState::OvertimePending
    );
    let requested = h.notifications_of(NotificationKind::OvertimeRequested).await;
    assert_eq!(requested.len(), 1);
    assert_eq!(requested[0].recipient, h.to_admins());

    let pending = overtime.list_pending(Some(h.branch.id)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, request.id);

    let approved = overtime
        .decide(
            request.id,
            &decision(OvertimeDecision::Approve, Some(45)),
            h.admin,
        )
        .await
        .unwrap();
    assert_eq!(approved.status, OvertimeStatus::Approved);
    assert_eq!(approved.approved_minutes, Some(45));
    assert_eq!(approved.decided_by, Some(h.admin));
    assert!(overtime.list_pending(None).await.unwrap().is_empty());

    h.advance(45);
    let closed = h
        .clock_controller()
        .clock_out(h.staff, h.near_branch(10.0), None)
        .await
        .unwrap();
    assert_eq!(closed.total_working_minutes, 530);
    assert_eq!(closed.overtime_minutes, 50);
    assert_eq!(closed.ot_approved_minutes, 45);
    assert_eq!(closed.ot_request_id, Some(request.id));

    let notices = h.notifications_of(NotificationKind::OvertimeApproved).await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].recipient, h.to_staff());
    assert_eq!(notices[0].payload["automatic"], false);
}

#[tokio::test]
async fn approved_minutes_never_exceed_observed_overtime() {
    let h = Harness::new();
    let record = h.clock_in_staff().await;
    let overtime = h.overtime();

    h.advance(490);
    let request = overtime.request(record.id, "delivery").await.unwrap();
    overtime
        .decide(
            request.id,
            &decision(OvertimeDecision::Approve, Some(120)),
            h.admin,
        )
        .await
        .unwrap();
    h.advance(10);
    let closed = h
        .clock_controller()
        .clock_out(h.staff, h.near_branch(10.0), None)
        .await
        .unwrap();
    assert_eq!(closed.overtime_minutes, 20);
    assert_eq!(closed.ot_approved_minutes, 20);
}

#[tokio::test]
async fn branches_without_approval_auto_approve_requests() {
    let h = Harness::with_config(ShopConfig {
        ot_approval_required: false,
        ..ShopConfig::default()
    });
    let record = h.clock_in_staff().await;

    h.advance(490);
    let request = h
        .overtime()
        .request(record.id, "customer waiting")
        .await
        .unwrap();
    assert_eq!(request.status, OvertimeStatus::Approved);
    assert_eq!(request.approved_minutes, Some(10));
    assert!(request.decided_by.is_none());

    let approved = h.notifications_of(NotificationKind::OvertimeApproved).await;
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].payload["automatic"], true);
    assert!(h
        .notifications_of(NotificationKind::OvertimeRequested)
        .await
        .is_empty());

    let err = h
        .overtime()
        .request(record.id, "more")
        .await
        .unwrap_err();
    assert_eq!(err.rejection_code(), Some(RejectionCode::OvertimeAlreadyApproved));
}

#[tokio::test]
async fn request_before_expected_minutes_is_refused() {
    let h = Harness::new();
    let record = h.clock_in_staff().await;
    h.advance(300);

    let err = h
        .overtime()
        .request(record.id, "busy day")
        .await
        .unwrap_err();
    assert_eq!(err.rejection_code(), Some(RejectionCode::OvertimeNotReached));

    h.advance(200);
    let err = h.overtime().request(record.id, "  ").await.unwrap_err();
    assert_eq!(err.rejection_code(), Some(RejectionCode::ReasonRequired));
}

#[tokio::test]
async fn rejection_leaves_record_open_and_asks_for_clock_out() {
    let h = Harness::new();
    let record = h.clock_in_staff().await;
    let overtime = h.overtime();

    h.advance(485);
    let request = overtime.request(record.id, "inventory").await.unwrap();
    let rejected = overtime
        .decide(
            request.id,
            &DecideOvertimeRequest {
                decision: OvertimeDecision::Reject,
                approved_minutes: None,
                note: Some("not budgeted".to_string()),
            },
            h.admin,
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, OvertimeStatus::Rejected);
    assert!(h.record(&record).await.is_open());
    let status = h.clock_controller().status(h.staff).await.unwrap();
    assert_eq!(status.status, AttendanceState::OvertimePending);
    assert!(status.pending_overtime.is_none());

    let notices = h.notifications_of(NotificationKind::OvertimeRejected).await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].recipient, h.to_staff());
    assert_eq!(notices[0].payload["action"], "clock_out");
    assert_eq!(notices[0].payload["note"], "not budgeted");

    let err = overtime
        .decide(
            request.id,
            &decision(OvertimeDecision::Approve, None),
            h.admin,
        )
        .await
        .unwrap_err();
    assert_eq!(err.rejection_code(), Some(RejectionCode::RequestNotPending));

    h.advance(30);
    assert_eq!(overtime.run_timeouts().await, 0);
    let closed = h
        .clock_controller()
        .clock_out(h.staff, h.near_branch(10.0), None)
        .await
        .unwrap();
    assert_eq!(closed.overtime_minutes, 35);
    assert_eq!(closed.ot_approved_minutes, 0);
    let status = h.clock_controller().status(h.staff).await.unwrap();
    assert_eq!(status.status, AttendanceState::ClockedOut);
}

#[tokio::test]
async fn unanswered_request_times_out_and_closes_record() {
    let h = Harness::new();
    let record = h.clock_in_staff().await;
    let overtime = h.overtime();

    h.advance(485);
    let request = overtime.request(record.id, "late delivery").await.unwrap();

    h.advance(14);
    assert_eq!(overtime.run_timeouts().await, 0);
    h.advance(1);
    assert_eq!(overtime.run_timeouts().await, 1);
    assert_eq!(overtime.run_timeouts().await, 0);

    let closed = h.record(&record).await;
    assert_eq!(closed.close_reason, CloseReason::OtTimeout);
    assert_eq!(closed.overtime_minutes, 20);
    assert_eq!(closed.ot_approved_minutes, 0);

    let stored = h
        .store
        .find_overtime_request(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OvertimeStatus::AutoClockout);

    let notices = h
        .notifications_of(NotificationKind::OvertimeAutoClockout)
        .await;
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().any(|n| n.recipient == h.to_staff()));
    assert!(notices.iter().any(|n| n.recipient == h.to_admins()));
}

#[tokio::test]
async fn closing_with_a_pending_request_expires_it() {
    let h = Harness::new();
    let record = h.clock_in_staff().await;
    h.advance(490);
    let request = h.overtime().request(record.id, "audit").await.unwrap();

    h.advance(5);
    h.clock_controller()
        .clock_out(h.staff, h.near_branch(10.0), None)
        .await
        .unwrap();

    let stored = h
        .store
        .find_overtime_request(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OvertimeStatus::Expired);
    assert!(h.overtime().list_pending(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn deciding_unknown_request_is_not_found() {
    let h = Harness::new();
    let err = h
        .overtime()
        .decide(
            OvertimeRequestId::new(),
            &decision(OvertimeDecision::Approve, None),
            h.admin,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
