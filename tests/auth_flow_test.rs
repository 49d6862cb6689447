//! Login, token and user endpoints against a real database

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use school_events::models::{UserRole, UserStatus};
use serde_json::{json, Value};
use serial_test::serial;

async fn login(server: &axum_test::TestServer, email: &str, password: &str) -> axum_test::TestResponse {
    server
        .post("/api/v1/auth/login_user/")
        .form(&[("username", email), ("password", password)])
        .await
}

#[tokio::test]
#[serial]
async fn test_login_and_me() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let admin = create_user(&ctx, "admin@admin.com", UserRole::Admin).await;
    let server = ctx.server();

    let response = login(&server, "ADMIN@admin.com", TEST_PASSWORD).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let tokens: Value = response.json();
    assert_eq!(tokens["token_type"], "bearer");
    let access = tokens["access_token"].as_str().unwrap().to_string();

    let response = server.get("/api/v1/user/me").authorization_bearer(&access).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["user_id"], admin.user_id);
    assert_eq!(body["data"]["user_email"], "admin@admin.com");
    assert!(body["data"].get("password_hash").is_none());
    assert_eq!(body["unread_notification"], false);
}

#[tokio::test]
#[serial]
async fn test_login_failures() {
    let Some(ctx) = TestContext::try_new().await else { return };
    create_user(&ctx, "rep@school.sk", UserRole::SchoolRepresentative).await;
    create_user_with_status(&ctx, "pending@school.sk", UserRole::SchoolRepresentative, UserStatus::Inactive).await;
    create_user_with_status(&ctx, "gone@school.sk", UserRole::SchoolRepresentative, UserStatus::Deleted).await;
    let server = ctx.server();

    let response = login(&server, "rep@school.sk", "wrong-password").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid user credentials");

    let response = login(&server, "nobody@school.sk", TEST_PASSWORD).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = login(&server, "pending@school.sk", TEST_PASSWORD).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = login(&server, "gone@school.sk", TEST_PASSWORD).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_refresh_token_rotation() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let user = create_user(&ctx, "analyst@example.com", UserRole::Analyst).await;
    let tokens = ctx.services.auth_service.issue_tokens(user.user_id).unwrap();
    let server = ctx.server();

    // an access token is not accepted as refresh token
    let response = server
        .post("/api/v1/auth/refresh_token")
        .authorization_bearer(&tokens.access_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/auth/refresh_token")
        .authorization_bearer(&tokens.refresh_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
}

#[tokio::test]
#[serial]
async fn test_user_management_permissions() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let admin = create_user(&ctx, "admin@admin.com", UserRole::Admin).await;
    let rep = create_user(&ctx, "rep@school.sk", UserRole::SchoolRepresentative).await;
    let other = create_user(&ctx, "other@school.sk", UserRole::SchoolRepresentative).await;
    let server = ctx.server();
    let admin_token = ctx.services.auth_service.issue_tokens(admin.user_id).unwrap().access_token;
    let rep_token = ctx.services.auth_service.issue_tokens(rep.user_id).unwrap().access_token;

    // listing users is an admin operation
    let response = server.get("/api/v1/user/").authorization_bearer(&rep_token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = server
        .get("/api/v1/user/")
        .add_query_param("current_page", 1)
        .add_query_param("items_per_page", 2)
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["total_items"], 3);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    // representatives see themselves but nobody else
    let response = server
        .get(&format!("/api/v1/user/{}", rep.user_id))
        .authorization_bearer(&rep_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let response = server
        .get(&format!("/api/v1/user/{}", other.user_id))
        .authorization_bearer(&rep_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = server
        .get("/api/v1/user/")
        .add_query_param("filter_params", "{not json")
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid parameters"));

    let response = server
        .get("/api/v1/user/")
        .add_query_param("filter_params", "{\"unknown_column\": 1}")
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid filter column: unknown_column");
}

#[tokio::test]
#[serial]
async fn test_registration_and_approval() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let admin = create_user(&ctx, "admin@admin.com", UserRole::Admin).await;
    let server = ctx.server();

    let response = server
        .post("/api/v1/user/register")
        .json(&json!({
            "first_name": "Eva",
            "last_name": "Kralova",
            "user_email": "eva@zs-hlboka.sk",
            "password": "Registr4tion!",
            "phone_number": "0905123456",
            "school": { "name": "ZS Hlboka", "ico": "12345678" }
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    let new_id = body["data"]["user_id"].as_i64().unwrap();
    assert_eq!(body["data"]["status"], "inactive");

    let response = login(&server, "eva@zs-hlboka.sk", "Registr4tion!").await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let admin_token = ctx.services.auth_service.issue_tokens(admin.user_id).unwrap().access_token;
    let response = server
        .put(&format!("/api/v1/user/{}/approve", new_id))
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = login(&server, "eva@zs-hlboka.sk", "Registr4tion!").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_login_survives_unreachable_redis() {
    let Some(ctx) = TestContext::try_new().await else { return };
    create_user(&ctx, "rep@school.sk", UserRole::SchoolRepresentative).await;

    let mut settings = ctx.settings.clone();
    settings.redis.url = "redis://127.0.0.1:1/".to_string();
    let services = ctx.services_with_settings(&settings).await;

    // lock lookup and counter reset both fail; the login itself must not
    let tokens = services.auth_service.login("rep@school.sk", TEST_PASSWORD).await.unwrap();
    assert!(!tokens.access_token.is_empty());

    let err = services.auth_service.login("rep@school.sk", "wrong-password").await.unwrap_err();
    assert_eq!(err.to_string(), "Authentication error: Invalid user credentials");
}
