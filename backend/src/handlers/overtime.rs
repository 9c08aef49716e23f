use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{
    error::AppError,
    models::{
        overtime_request::{CreateOvertimeRequest, OvertimeRequest},
        user::CurrentUser,
    },
    state::AppState,
    validation::validate_payload,
};

pub async fn create_overtime_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateOvertimeRequest>,
) -> Result<Json<OvertimeRequest>, AppError> {
    validate_payload(&payload)?;
    let attendance_id = state
        .activity
        .resolve_attendance(&user, payload.attendance_id)
        .await?;
    let request = state.overtime.request(attendance_id, &payload.reason).await?;
    Ok(Json(request))
}
