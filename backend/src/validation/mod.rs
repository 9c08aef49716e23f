//! Request payload validation shared by the handlers.

use crate::error::{AppError, RejectionCode};

pub use validator::Validate;

/// Runs the payload's validator rules.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(AppError::from)
}

/// Validates a payload whose only rules are coordinate ranges, reporting
/// failures as `INVALID_COORDINATES`.
pub fn validate_coordinates<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(|errors| {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort();
        AppError::rejected(
            RejectionCode::InvalidCoordinates,
            format!("Coordinates out of range: {}", fields.join(", ")),
        )
    })
}
