use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Machine-readable reason a request was refused.
///
/// Each code belongs to one category which decides the HTTP status:
/// validation (400), conflict / state (409), policy (422).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    InvalidCoordinates,
    NoBranchAssignment,
    ReasonRequired,
    InvalidCloseReason,
    AlreadyOpen,
    AlreadyClockedOut,
    PeriodAlreadyOpen,
    OvertimePending,
    OvertimeAlreadyApproved,
    RequestNotPending,
    NotOpen,
    NotActive,
    NoOpenPeriod,
    OutsideGeofence,
    OnBreak,
    AtPrayer,
    OnOutsideWork,
    OvertimeNotReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    Validation,
    Conflict,
    Policy,
}

impl RejectionCode {
    pub fn as_str(&self) -> &'static str {
        use RejectionCode::*;
        match self {
            InvalidCoordinates => "INVALID_COORDINATES",
            NoBranchAssignment => "NO_BRANCH_ASSIGNMENT",
            ReasonRequired => "REASON_REQUIRED",
            InvalidCloseReason => "INVALID_CLOSE_REASON",
            AlreadyOpen => "ALREADY_OPEN",
            AlreadyClockedOut => "ALREADY_CLOCKED_OUT",
            PeriodAlreadyOpen => "PERIOD_ALREADY_OPEN",
            OvertimePending => "OVERTIME_PENDING",
            OvertimeAlreadyApproved => "OVERTIME_ALREADY_APPROVED",
            RequestNotPending => "REQUEST_NOT_PENDING",
            NotOpen => "NOT_OPEN",
            NotActive => "NOT_ACTIVE",
            NoOpenPeriod => "NO_OPEN_PERIOD",
            OutsideGeofence => "OUTSIDE_GEOFENCE",
            OnBreak => "ON_BREAK",
            AtPrayer => "AT_PRAYER",
            OnOutsideWork => "ON_OUTSIDE_WORK",
            OvertimeNotReached => "OVERTIME_NOT_REACHED",
        }
    }

    pub fn kind(&self) -> RejectionKind {
        use RejectionCode::*;
        match self {
            InvalidCoordinates | NoBranchAssignment | ReasonRequired | InvalidCloseReason => {
                RejectionKind::Validation
            }
            AlreadyOpen | AlreadyClockedOut | PeriodAlreadyOpen | OvertimePending
            | OvertimeAlreadyApproved | RequestNotPending | NotOpen | NotActive
            | NoOpenPeriod => RejectionKind::Conflict,
            OutsideGeofence | OnBreak | AtPrayer | OnOutsideWork | OvertimeNotReached => {
                RejectionKind::Policy
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            RejectionKind::Validation => StatusCode::BAD_REQUEST,
            RejectionKind::Conflict => StatusCode::CONFLICT,
            RejectionKind::Policy => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{code}: {message}")]
    Rejected {
        code: RejectionCode,
        message: String,
    },
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("internal error: {0:#}")]
    InternalServerError(anyhow::Error),
}

impl AppError {
    pub fn rejected(code: RejectionCode, message: impl Into<String>) -> Self {
        AppError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Returns the rejection code when this error is a refused transition.
    pub fn rejection_code(&self) -> Option<RejectionCode> {
        match self {
            AppError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND".to_string(), None),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                msg,
                "UNAUTHORIZED".to_string(),
                None,
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN".to_string(), None),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                "BAD_REQUEST".to_string(),
                None,
            ),
            AppError::Rejected { code, message } => {
                (code.status(), message, code.as_str().to_string(), None)
            }
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::InternalServerError(err.into()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn rejection_codes_map_to_category_status() {
        let response =
            AppError::rejected(RejectionCode::AlreadyOpen, "already clocked in").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = response_json(response).await;
        assert_eq!(json["code"], "ALREADY_OPEN");
        assert_eq!(json["error"], "already clocked in");

        let response =
            AppError::rejected(RejectionCode::OutsideGeofence, "too far").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = response_json(response).await;
        assert_eq!(json["code"], "OUTSIDE_GEOFENCE");

        let response =
            AppError::rejected(RejectionCode::InvalidCoordinates, "bad lat").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn app_error_into_response_maps_status_and_body() {
        let response = AppError::NotFound("missing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["error"], "missing");
        assert_eq!(json["code"], "NOT_FOUND");

        let response = AppError::Forbidden("denied".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn app_error_validation_includes_details() {
        let response = AppError::Validation(vec!["reason: length".to_string()]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["details"]["errors"][0], "reason: length");
    }

    #[tokio::test]
    async fn app_error_internal_maps_to_generic_message() {
        let response = AppError::InternalServerError(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(json["details"].is_null());
    }

    #[test]
    fn rejection_code_serializes_screaming_snake() {
        let v = serde_json::to_value(RejectionCode::OnOutsideWork).unwrap();
        assert_eq!(v, serde_json::json!("ON_OUTSIDE_WORK"));
        assert_eq!(RejectionCode::OnOutsideWork.as_str(), "ON_OUTSIDE_WORK");
    }
}
