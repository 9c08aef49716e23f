use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{docs::ApiDoc, middleware, state::AppState};

pub mod admin;
pub mod attendance;
pub mod overtime;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Full HTTP surface with its auth, tracing and CORS layers.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/api/docs/openapi.json", get(openapi_json));

    let user_routes = Router::new()
        .route("/api/attendance/clock-in", post(attendance::clock_in))
        .route("/api/attendance/clock-out", post(attendance::clock_out))
        .route(
            "/api/attendance/status",
            get(attendance::get_attendance_status),
        )
        .route("/api/attendance/me", get(attendance::get_my_attendance))
        .route("/api/attendance/location", post(attendance::report_location))
        .route(
            "/api/attendance/periods/start",
            post(attendance::start_period),
        )
        .route("/api/attendance/periods/end", post(attendance::end_period))
        .route(
            "/api/attendance/{id}",
            get(attendance::get_attendance_detail),
        )
        .route(
            "/api/overtime/requests",
            post(overtime::create_overtime_request),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/admin/attendance/open",
            get(admin::list_open_attendance),
        )
        .route(
            "/api/admin/attendance/{id}/close",
            post(admin::close_attendance),
        )
        .route("/api/admin/reentry", post(admin::grant_reentry))
        .route(
            "/api/admin/overtime/pending",
            get(admin::list_pending_overtime),
        )
        .route(
            "/api/admin/overtime/{id}/decision",
            put(admin::decide_overtime),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                        .allow_headers(Any)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state)
}
