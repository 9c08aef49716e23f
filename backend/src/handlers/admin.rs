use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppError,
    models::{
        attendance::{AdminCloseRequest, AttendanceRecord, ReentryGrantRequest},
        overtime_request::{DecideOvertimeRequest, OvertimeRequest},
        user::CurrentUser,
    },
    state::AppState,
    types::{AttendanceId, BranchId, OvertimeRequestId},
    utils::geo::GeoPoint,
    validation::validate_payload,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PendingOvertimeQuery {
    pub branch_id: Option<BranchId>,
}

pub async fn list_open_attendance(
    State(state): State<AppState>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    Ok(Json(state.clock.list_open().await?))
}

pub async fn close_attendance(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(attendance_id): Path<AttendanceId>,
    payload: Option<Json<AdminCloseRequest>>,
) -> Result<Json<AttendanceRecord>, AppError> {
    let location = match payload.map(|Json(body)| (body.latitude, body.longitude)) {
        None | Some((None, None)) => None,
        Some((Some(latitude), Some(longitude))) => Some(GeoPoint::new(latitude, longitude)),
        Some(_) => {
            return Err(AppError::BadRequest(
                "latitude and longitude must be given together".to_string(),
            ))
        }
    };
    let record = state
        .clock
        .close_by_admin(attendance_id, location, admin.id)
        .await?;
    Ok(Json(record))
}

pub async fn grant_reentry(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Json(payload): Json<ReentryGrantRequest>,
) -> Result<StatusCode, AppError> {
    state
        .clock
        .grant_reentry(payload.user_id, payload.work_date, admin.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_pending_overtime(
    State(state): State<AppState>,
    Query(query): Query<PendingOvertimeQuery>,
) -> Result<Json<Vec<OvertimeRequest>>, AppError> {
    Ok(Json(state.overtime.list_pending(query.branch_id).await?))
}

pub async fn decide_overtime(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(request_id): Path<OvertimeRequestId>,
    Json(payload): Json<DecideOvertimeRequest>,
) -> Result<Json<OvertimeRequest>, AppError> {
    validate_payload(&payload)?;
    let request = state.overtime.decide(request_id, &payload, admin.id).await?;
    Ok(Json(request))
}
