use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::user::CurrentUser,
    state::AppState,
    utils::jwt::{verify_access_token, Claims},
};

pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate_request(request.headers(), &state.config.jwt_secret)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

// Auth + require admin role for admin-only routes
pub async fn auth_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate_request(request.headers(), &state.config.jwt_secret)?;
    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    if let Some(rest) = header.strip_prefix("Bearer ") {
        return Some(rest);
    }
    if let Some(rest) = header.strip_prefix("bearer ") {
        return Some(rest);
    }
    if let Some(space_idx) = header.find(' ') {
        let (scheme, rest) = header.split_at(space_idx);
        if scheme.eq_ignore_ascii_case("bearer") {
            return Some(rest.trim_start());
        }
    }
    None
}

fn authenticate_request(
    headers: &axum::http::HeaderMap,
    secret: &str,
) -> Result<CurrentUser, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims: Claims = verify_access_token(token, secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    Ok(CurrentUser {
        id: claims.sub,
        role: claims.role,
    })
}
