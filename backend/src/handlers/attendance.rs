use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};

use crate::{
    error::AppError,
    models::{
        activity_period::ActivityPeriod,
        attendance::{
            AttendanceDetailResponse, AttendanceRecord, AttendanceStatusResponse, ClockInRequest,
            ClockOutRequest, EndPeriodRequest, LocationReport, StartPeriodRequest,
        },
        user::CurrentUser,
        DateRangeQuery,
    },
    services::evidence::store_photo,
    state::AppState,
    types::AttendanceId,
    utils::{geo::GeoPoint, time::local_date},
    validation::{validate_coordinates, validate_payload},
};

pub async fn clock_in(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ClockInRequest>,
) -> Result<Json<AttendanceRecord>, AppError> {
    validate_coordinates(&payload)?;
    let location = GeoPoint::new(payload.latitude, payload.longitude);
    let evidence = store_photo(state.evidence.as_ref(), payload.photo_base64.as_deref()).await?;
    let record = state.clock.clock_in(user.id, location, evidence).await?;
    Ok(Json(record))
}

pub async fn clock_out(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ClockOutRequest>,
) -> Result<Json<AttendanceRecord>, AppError> {
    validate_coordinates(&payload)?;
    let location = GeoPoint::new(payload.latitude, payload.longitude);
    let evidence = store_photo(state.evidence.as_ref(), payload.photo_base64.as_deref()).await?;
    let record = state.clock.clock_out(user.id, location, evidence).await?;
    Ok(Json(record))
}

pub async fn report_location(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<LocationReport>,
) -> Result<Json<AttendanceRecord>, AppError> {
    validate_coordinates(&payload)?;
    let location = GeoPoint::new(payload.latitude, payload.longitude);
    let record = state.clock.report_location(user.id, location).await?;
    Ok(Json(record))
}

pub async fn get_attendance_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<AttendanceStatusResponse>, AppError> {
    Ok(Json(state.clock.status(user.id).await?))
}

pub async fn get_my_attendance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    let today = local_date(state.context.clock.now(), &state.config.time_zone);
    let (from, to) = query.resolve(today);
    Ok(Json(state.clock.history(user.id, from, to).await?))
}

pub async fn get_attendance_detail(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(attendance_id): Path<AttendanceId>,
) -> Result<Json<AttendanceDetailResponse>, AppError> {
    let id = state
        .activity
        .resolve_attendance(&user, Some(attendance_id))
        .await?;
    let aggregate = state.context.load(id).await?;
    Ok(Json(AttendanceDetailResponse {
        record: aggregate.record,
        periods: aggregate.periods,
    }))
}

pub async fn start_period(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<StartPeriodRequest>,
) -> Result<Json<ActivityPeriod>, AppError> {
    validate_payload(&payload)?;
    let attendance_id = state
        .activity
        .resolve_attendance(&user, payload.attendance_id)
        .await?;
    let period = state
        .activity
        .start(attendance_id, payload.period_type, payload.reason)
        .await?;
    Ok(Json(period))
}

pub async fn end_period(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<EndPeriodRequest>,
) -> Result<Json<ActivityPeriod>, AppError> {
    let attendance_id = state
        .activity
        .resolve_attendance(&user, payload.attendance_id)
        .await?;
    let period = state
        .activity
        .end(attendance_id, payload.period_type)
        .await?;
    Ok(Json(period))
}
