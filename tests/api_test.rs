//! HTTP surface tests that never reach the database
//!
//! Routing fallback, docs basic auth, bearer checks and request validation
//! all answer before a repository is touched.

mod helpers;

use axum::http::{header, HeaderValue, StatusCode};
use base64::Engine;
use helpers::*;
use serde_json::Value;

fn basic(login: &str, password: &str) -> HeaderValue {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", login, password));
    HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap()
}

#[tokio::test]
async fn test_health_reports_version() {
    let (server, _dir) = offline_server().await;

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["version"], school_events::VERSION);
    assert_eq!(body["status_code"], 200);
}

#[tokio::test]
async fn test_unknown_route_answers_400_envelope() {
    let (server, _dir) = offline_server().await;

    let response = server.get("/api/v1/does-not-exist").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Route not found: /api/v1/does-not-exist");
    assert_eq!(body["message"], body["error"]);
    assert_eq!(body["status_code"], 400);
    assert!(body["api_id"].is_string());
}

#[tokio::test]
async fn test_docs_require_basic_auth() {
    let (server, _dir) = offline_server().await;

    for path in ["/api/docs", "/api/redoc", "/api/openapi.json"] {
        let response = server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED, "{}", path);
        assert_eq!(
            response.header(header::WWW_AUTHENTICATE),
            HeaderValue::from_static("Basic realm=\"Access to the API docs\"")
        );
        let body: Value = response.json();
        assert_eq!(body["error"], "Incorrect login or password");
    }

    let response = server
        .get("/api/openapi.json")
        .add_header(header::AUTHORIZATION, basic("docs", "wrong"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_docs_served_with_valid_credentials() {
    let (server, _dir) = offline_server().await;

    let response = server
        .get("/api/openapi.json")
        .add_header(header::AUTHORIZATION, basic("docs", "docs-secret"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let doc: Value = response.json();
    assert_eq!(doc["openapi"], "3.0.3");
    assert!(doc["paths"]["/api/v1/reservation/"]["post"].is_object());

    let response = server
        .get("/api/docs")
        .add_header(header::AUTHORIZATION, basic("docs", "docs-secret"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("swagger-ui"));
}

#[tokio::test]
async fn test_protected_routes_need_bearer_token() {
    let (server, _dir) = offline_server().await;

    let response = server.get("/api/v1/user/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid authentication credentials");

    let response = server
        .post("/api/v1/reservation/")
        .authorization_bearer("not-a-jwt")
        .json(&serde_json::json!({ "event_id": 1, "event_date_id": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_form_validation() {
    let (server, _dir) = offline_server().await;

    let response = server
        .post("/api/v1/auth/login_user/")
        .form(&[("username", "admin@admin.com")])
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["status_code"], 422);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_refresh_requires_token() {
    let (server, _dir) = offline_server().await;

    let response = server.post("/api/v1/auth/refresh_token").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_files_require_token() {
    let (server, _dir) = offline_server().await;

    let response = server.get("/files/posters/a.png").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server.get("/files/posters/a.png?token=garbage").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (server, _dir) = offline_server().await;

    let response = server
        .get("/health")
        .add_header(header::HeaderName::from_static("x-request-id"), HeaderValue::from_static("req-42"))
        .await;
    assert_eq!(response.header("x-request-id"), HeaderValue::from_static("req-42"));
}
