use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;

use presence_backend::{
    handlers,
    models::{branch::ShopConfig, user::UserRole},
    types::UserId,
};

mod support;

use support::{create_test_token, Harness};

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.clone().oneshot(request).await.expect("call router");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

struct Api {
    h: Harness,
    app: Router,
    staff_token: String,
    admin_token: String,
}

impl Api {
    fn new(config: ShopConfig) -> Self {
        let h = Harness::with_config(config);
        let app = handlers::router(h.app_state());
        let staff_token = create_test_token(h.staff, UserRole::Staff);
        let admin_token = create_test_token(h.admin, UserRole::Admin);
        Self {
            h,
            app,
            staff_token,
            admin_token,
        }
    }

    fn at(&self, metres: f64) -> Value {
        let point = self.h.near_branch(metres);
        json!({ "latitude": point.latitude, "longitude": point.longitude })
    }

    async fn staff(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.app, method, uri, Some(&self.staff_token), body).await
    }

    async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.app, method, uri, Some(&self.admin_token), body).await
    }
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let api = Api::new(ShopConfig::default());

    let (status, body) = send(&api.app, Method::GET, "/api/attendance/status", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &api.app,
        Method::GET,
        "/api/attendance/status",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let api = Api::new(ShopConfig::default());

    let (status, body) = api
        .staff(Method::GET, "/api/admin/attendance/open", None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = api
        .admin(Method::GET, "/api/admin/attendance/open", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn clock_in_and_out_over_http() {
    let api = Api::new(ShopConfig::default());

    let (status, body) = api
        .staff(Method::GET, "/api/attendance/status", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_started");

    let mut payload = api.at(20.0);
    payload["photo_base64"] = json!(STANDARD.encode(b"selfie"));
    let (status, record) = api
        .staff(Method::POST, "/api/attendance/clock-in", Some(payload))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["close_reason"], "none");
    assert!(record["clock_in_evidence"]
        .as_str()
        .unwrap()
        .starts_with("sha256:"));

    let (status, body) = api
        .staff(Method::POST, "/api/attendance/clock-in", Some(api.at(20.0)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_OPEN");

    let (status, body) = api
        .staff(Method::GET, "/api/attendance/status", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "working");

    api.h.advance(240);
    let (status, closed) = api
        .staff(Method::POST, "/api/attendance/clock-out", Some(api.at(15.0)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["close_reason"], "manual");
    assert_eq!(closed["total_working_minutes"], 240);

    let (status, history) = api.staff(Method::GET, "/api/attendance/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"], record["id"]);
}

#[tokio::test]
async fn rejections_carry_code_and_category_status() {
    let api = Api::new(ShopConfig {
        geofence_radius_m: 100.0,
        ..ShopConfig::default()
    });

    let (status, body) = api
        .staff(
            Method::POST,
            "/api/attendance/clock-in",
            Some(json!({ "latitude": 95.0, "longitude": 46.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_COORDINATES");

    let (status, body) = api
        .staff(Method::POST, "/api/attendance/clock-in", Some(api.at(400.0)))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "OUTSIDE_GEOFENCE");

    let (status, body) = api
        .staff(Method::POST, "/api/attendance/clock-out", Some(api.at(10.0)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_OPEN");

    let stranger = create_test_token(UserId::new(), UserRole::Staff);
    let (status, body) = send(
        &api.app,
        Method::POST,
        "/api/attendance/clock-in",
        Some(&stranger),
        Some(api.at(10.0)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NO_BRANCH_ASSIGNMENT");
}

#[tokio::test]
async fn activity_periods_over_http() {
    let api = Api::new(ShopConfig::default());
    api.h.clock_in_staff().await;

    let (status, body) = api
        .staff(
            Method::POST,
            "/api/attendance/periods/start",
            Some(json!({ "period_type": "outside_work" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "REASON_REQUIRED");

    let (status, period) = api
        .staff(
            Method::POST,
            "/api/attendance/periods/start",
            Some(json!({ "period_type": "break" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(period["period_type"], "break");

    let (status, body) = api
        .staff(
            Method::POST,
            "/api/attendance/periods/start",
            Some(json!({ "period_type": "prayer" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "ON_BREAK");

    let (_, status_body) = api
        .staff(Method::GET, "/api/attendance/status", None)
        .await;
    assert_eq!(status_body["status"], "on_break");

    api.h.advance(20);
    let (status, ended) = api
        .staff(
            Method::POST,
            "/api/attendance/periods/end",
            Some(json!({ "period_type": "break" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["duration_minutes"], 20);

    let (status, body) = api
        .staff(
            Method::POST,
            "/api/attendance/periods/end",
            Some(json!({ "period_type": "break" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NO_OPEN_PERIOD");
}

#[tokio::test]
async fn attendance_detail_is_private_to_its_owner_and_admins() {
    let api = Api::new(ShopConfig::default());
    let record = api.h.clock_in_staff().await;
    let uri = format!("/api/attendance/{}", record.id);

    let (status, body) = api.staff(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["id"], record.id.to_string());
    assert_eq!(body["periods"], json!([]));

    let other = create_test_token(UserId::new(), UserRole::Staff);
    let (status, _) = send(&api.app, Method::GET, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = api.admin(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let missing = format!("/api/attendance/{}", uuid::Uuid::new_v4());
    let (status, _) = api.staff(Method::GET, &missing, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overtime_request_and_admin_decision_over_http() {
    let api = Api::new(ShopConfig::default());
    api.h.clock_in_staff().await;

    api.h.advance(60);
    let (status, body) = api
        .staff(
            Method::POST,
            "/api/overtime/requests",
            Some(json!({ "reason": "month-end close" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "OVERTIME_NOT_REACHED");

    api.h.advance(430);
    let (status, request) = api
        .staff(
            Method::POST,
            "/api/overtime/requests",
            Some(json!({ "reason": "month-end close" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["status"], "pending");

    let uri = format!("/api/admin/overtime/pending?branch_id={}", api.h.branch.id);
    let (status, pending) = api.admin(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let decision_uri = format!(
        "/api/admin/overtime/{}/decision",
        request["id"].as_str().unwrap()
    );
    let (status, decided) = api
        .admin(
            Method::PUT,
            &decision_uri,
            Some(json!({ "decision": "approve", "approved_minutes": 30 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["status"], "approved");
    assert_eq!(decided["approved_minutes"], 30);

    let (status, body) = api
        .admin(
            Method::PUT,
            &decision_uri,
            Some(json!({ "decision": "reject" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "REQUEST_NOT_PENDING");
}

#[tokio::test]
async fn admin_close_and_reentry_over_http() {
    let api = Api::new(ShopConfig::default());
    let record = api.h.clock_in_staff().await;
    let close_uri = format!("/api/admin/attendance/{}/close", record.id);

    let (status, open) = api
        .admin(Method::GET, "/api/admin/attendance/open", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(open.as_array().unwrap().len(), 1);

    let (status, _) = api
        .admin(Method::POST, &close_uri, Some(json!({ "latitude": 24.7 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    api.h.advance(120);
    let (status, closed) = api.admin(Method::POST, &close_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["close_reason"], "admin");

    let (status, body) = api.admin(Method::POST, &close_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_OPEN");

    let (status, body) = api
        .staff(Method::POST, "/api/attendance/clock-in", Some(api.at(10.0)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_CLOCKED_OUT");

    let (status, body) = api
        .admin(
            Method::POST,
            "/api/admin/reentry",
            Some(json!({ "user_id": api.h.staff, "work_date": record.work_date })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, reopened) = api
        .staff(Method::POST, "/api/attendance/clock-in", Some(api.at(10.0)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reopened["allow_reentry"], true);
}

#[tokio::test]
async fn openapi_document_is_public() {
    let api = Api::new(ShopConfig::default());

    let (status, doc) = send(&api.app, Method::GET, "/api/docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let paths = doc["paths"].as_object().expect("paths object");
    assert!(paths.contains_key("/api/attendance/clock-in"));
    assert!(paths.contains_key("/api/admin/overtime/{id}/decision"));
    assert_eq!(
        doc.pointer("/components/securitySchemes/BearerAuth/scheme")
            .and_then(Value::as_str),
        Some("bearer")
    );
}
