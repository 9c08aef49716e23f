#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    handlers::admin::PendingOvertimeQuery,
    models::{
        activity_period::{ActivityPeriod, PeriodType},
        attendance::{
            AdminCloseRequest, AttendanceDetailResponse, AttendanceRecord, AttendanceState,
            AttendanceStatusResponse, ClockInRequest, ClockOutRequest, CloseReason,
            EndPeriodRequest, LocationReport, ReentryGrantRequest, StartPeriodRequest,
        },
        overtime_request::{
            CreateOvertimeRequest, DecideOvertimeRequest, OvertimeDecision, OvertimeRequest,
            OvertimeStatus,
        },
        DateRangeQuery,
    },
    utils::geo::GeoPoint,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        clock_in_doc,
        clock_out_doc,
        attendance_status_doc,
        my_attendance_doc,
        attendance_detail_doc,
        report_location_doc,
        start_period_doc,
        end_period_doc,
        create_overtime_doc,
        admin_open_attendance_doc,
        admin_close_attendance_doc,
        admin_grant_reentry_doc,
        admin_pending_overtime_doc,
        admin_decide_overtime_doc
    ),
    components(
        schemas(
            // attendance & periods
            ClockInRequest,
            ClockOutRequest,
            LocationReport,
            StartPeriodRequest,
            EndPeriodRequest,
            AttendanceRecord,
            AttendanceStatusResponse,
            AttendanceState,
            AttendanceDetailResponse,
            ActivityPeriod,
            PeriodType,
            CloseReason,
            GeoPoint,
            // overtime
            CreateOvertimeRequest,
            DecideOvertimeRequest,
            OvertimeDecision,
            OvertimeRequest,
            OvertimeStatus,
            // admin-specific payloads
            AdminCloseRequest,
            ReentryGrantRequest
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Attendance", description = "Clock-in/out, activity periods and history"),
        (name = "Overtime", description = "Overtime requests"),
        (name = "Admin", description = "Branch administration")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());
        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    request_body = ClockInRequest,
    responses(
        (status = 200, body = AttendanceRecord),
        (status = 400, description = "INVALID_COORDINATES / NO_BRANCH_ASSIGNMENT"),
        (status = 409, description = "ALREADY_OPEN / ALREADY_CLOCKED_OUT"),
        (status = 422, description = "OUTSIDE_GEOFENCE")
    ),
    tag = "Attendance"
)]
fn clock_in_doc() {}

#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    request_body = ClockOutRequest,
    responses(
        (status = 200, description = "Closed record; repeated calls return it unchanged", body = AttendanceRecord),
        (status = 409, description = "NOT_OPEN")
    ),
    tag = "Attendance"
)]
fn clock_out_doc() {}

#[utoipa::path(
    get,
    path = "/api/attendance/status",
    responses((status = 200, body = AttendanceStatusResponse)),
    tag = "Attendance"
)]
fn attendance_status_doc() {}

#[utoipa::path(
    get,
    path = "/api/attendance/me",
    params(DateRangeQuery),
    responses((status = 200, body = [AttendanceRecord])),
    tag = "Attendance"
)]
fn my_attendance_doc() {}

#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(("id" = uuid::Uuid, Path, description = "Attendance record id")),
    responses(
        (status = 200, body = AttendanceDetailResponse),
        (status = 403, description = "Record belongs to another user"),
        (status = 404, description = "Unknown record")
    ),
    tag = "Attendance"
)]
fn attendance_detail_doc() {}

#[utoipa::path(
    post,
    path = "/api/attendance/location",
    request_body = LocationReport,
    responses((status = 200, body = AttendanceRecord)),
    tag = "Attendance"
)]
fn report_location_doc() {}

#[utoipa::path(
    post,
    path = "/api/attendance/periods/start",
    request_body = StartPeriodRequest,
    responses(
        (status = 200, body = ActivityPeriod),
        (status = 409, description = "NOT_ACTIVE / PERIOD_ALREADY_OPEN"),
        (status = 422, description = "ON_BREAK / AT_PRAYER / ON_OUTSIDE_WORK")
    ),
    tag = "Attendance"
)]
fn start_period_doc() {}

#[utoipa::path(
    post,
    path = "/api/attendance/periods/end",
    request_body = EndPeriodRequest,
    responses(
        (status = 200, body = ActivityPeriod),
        (status = 409, description = "NO_OPEN_PERIOD")
    ),
    tag = "Attendance"
)]
fn end_period_doc() {}

#[utoipa::path(
    post,
    path = "/api/overtime/requests",
    request_body = CreateOvertimeRequest,
    responses(
        (status = 200, body = OvertimeRequest),
        (status = 409, description = "OVERTIME_PENDING / OVERTIME_ALREADY_APPROVED"),
        (status = 422, description = "OVERTIME_NOT_REACHED")
    ),
    tag = "Overtime"
)]
fn create_overtime_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/attendance/open",
    responses((status = 200, body = [AttendanceRecord])),
    tag = "Admin"
)]
fn admin_open_attendance_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/attendance/{id}/close",
    params(("id" = uuid::Uuid, Path, description = "Attendance record id")),
    request_body = AdminCloseRequest,
    responses(
        (status = 200, body = AttendanceRecord),
        (status = 409, description = "NOT_OPEN")
    ),
    tag = "Admin"
)]
fn admin_close_attendance_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/reentry",
    request_body = ReentryGrantRequest,
    responses((status = 204, description = "Re-entry granted")),
    tag = "Admin"
)]
fn admin_grant_reentry_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/overtime/pending",
    params(PendingOvertimeQuery),
    responses((status = 200, body = [OvertimeRequest])),
    tag = "Admin"
)]
fn admin_pending_overtime_doc() {}

#[utoipa::path(
    put,
    path = "/api/admin/overtime/{id}/decision",
    params(("id" = uuid::Uuid, Path, description = "Overtime request id")),
    request_body = DecideOvertimeRequest,
    responses(
        (status = 200, body = OvertimeRequest),
        (status = 409, description = "REQUEST_NOT_PENDING")
    ),
    tag = "Admin"
)]
fn admin_decide_overtime_doc() {}
