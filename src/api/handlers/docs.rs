//! API documentation pages, served behind basic auth

use axum::{extract::State, response::Html, Json};
use serde_json::{json, Map, Value};

use crate::api::state::AppState;

/// Method, path below the API prefix, summary
const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("post", "/auth/login_user/", "Log in with email and password"),
    ("post", "/auth/refresh_token", "Exchange a refresh token"),
    ("post", "/user/", "Create a user"),
    ("get", "/user/", "List users"),
    ("get", "/user/me", "Current user"),
    ("get", "/user/pending", "Users waiting for approval"),
    ("post", "/user/register", "Register a school representative"),
    ("get", "/user/{id}", "Get a user"),
    ("put", "/user/{id}", "Update a user"),
    ("delete", "/user/{id}", "Delete a user"),
    ("put", "/user/{id}/approve", "Approve a registration"),
    ("put", "/user/{id}/reject", "Reject a registration"),
    ("post", "/event/", "Create an event"),
    ("get", "/event/", "List events"),
    ("get", "/event/with-dates/", "List events with their dates"),
    ("get", "/event/{id}", "Get an event"),
    ("put", "/event/{id}", "Update an event"),
    ("delete", "/event/{id}", "Delete an event"),
    ("get", "/event/organizer/{organizer_id}/events", "Events of an organizer"),
    ("get", "/event/{event_date_id}/event-date/", "Get an event date"),
    ("put", "/event/event-date/lock-time", "Set the lock time of a date"),
    ("post", "/event/{event_date_id}/mark-as-paid", "Mark a date as paid"),
    ("post", "/event/{event_date_id}/mark-as-completed", "Mark a date as completed"),
    ("post", "/event/claims", "Submit an event claim"),
    ("get", "/event/claims/pending", "Pending claims"),
    ("put", "/event/claims/{id}", "Approve or reject a claim"),
    ("post", "/event/export", "Export rows as CSV"),
    ("post", "/reservation/", "Create a reservation"),
    ("get", "/reservation/", "List reservations"),
    ("get", "/reservation/{id}", "Get a reservation"),
    ("put", "/reservation/{id}", "Update a reservation"),
    ("delete", "/reservation/{id}", "Delete a reservation"),
    ("get", "/reservation/event/{event_id}", "Reservations of an event"),
    ("get", "/reservation/user/{user_id}", "Reservations of a user"),
    ("get", "/reservation/user/{user_id}/event/{event_id}", "Reservations of a user for an event"),
    ("get", "/reservation/code/{code}", "Find a reservation by code"),
    ("put", "/reservation/{id}/confirm/", "Confirm a reservation"),
    ("put", "/reservation/{id}/reject/", "Reject a reservation"),
    ("put", "/reservation/{id}/cancel/", "Cancel a reservation"),
    ("post", "/waiting-list/", "Join a waiting list"),
    ("get", "/waiting-list/{event_date_id}", "Waiting list of a date"),
    ("put", "/waiting-list/{id}", "Update a waiting list entry"),
    ("delete", "/waiting-list/{id}", "Leave a waiting list"),
    ("get", "/waiting-list/entry/{id}", "Get a waiting list entry"),
    ("get", "/waiting-list/user/{user_id}", "Waiting list entries of a user"),
    ("get", "/waiting-list/by-event-date/{event_date_id}/user/{user_id}", "Entries of a user for a date"),
    ("post", "/waiting-list/{event_date_id}/process", "Process a waiting list"),
    ("get", "/notification/", "Notifications of the current user"),
    ("put", "/notification/{id}/read", "Mark a notification read"),
    ("delete", "/notification/{id}", "Delete a notification"),
    ("post", "/statistics/statistics", "Compute statistics"),
    ("post", "/report/generate", "Generate a report"),
    ("get", "/report/", "List reports"),
    ("get", "/report/{id}", "Get a report"),
    ("delete", "/report/{id}", "Delete a report"),
    ("get", "/report/{id}/export", "Download a report"),
    ("get", "/log/", "Audit log"),
    ("get", "/log/changelog", "Change history of a record"),
    ("get", "/health", "Service health"),
];

pub fn openapi_document(title: &str, version: &str, prefix: &str) -> Value {
    let mut paths = Map::new();
    for (method, path, summary) in ENDPOINTS {
        let entry = paths
            .entry(format!("{}{}", prefix, path))
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(operations) = entry {
            let tag = path.trim_start_matches('/').split('/').next().unwrap_or_default();
            operations.insert(
                method.to_string(),
                json!({ "summary": summary, "tags": [tag], "responses": { "200": { "description": "GenericResponse envelope" } } }),
            );
        }
    }
    json!({
        "openapi": "3.0.3",
        "info": { "title": title, "version": version },
        "components": {
            "securitySchemes": { "bearer": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" } }
        },
        "security": [{ "bearer": [] }],
        "paths": paths,
    })
}

pub async fn openapi_json(State(state): State<AppState>) -> Json<Value> {
    let app = &state.settings.app;
    Json(openapi_document(&app.project_name, crate::VERSION, &app.api_prefix))
}

pub async fn swagger_ui() -> Html<&'static str> {
    Html(
        r##"<!DOCTYPE html>
<html>
<head>
<title>API docs</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>SwaggerUIBundle({ url: "/api/openapi.json", dom_id: "#swagger-ui" });</script>
</body>
</html>"##,
    )
}

pub async fn redoc() -> Html<&'static str> {
    Html(
        r##"<!DOCTYPE html>
<html>
<head><title>API docs</title></head>
<body>
<redoc spec-url="/api/openapi.json"></redoc>
<script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"></script>
</body>
</html>"##,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_groups_methods_by_path() {
        let doc = openapi_document("School Events", "0.1.0", "/api/v1");
        let user = &doc["paths"]["/api/v1/user/{id}"];
        assert!(user.get("get").is_some());
        assert!(user.get("put").is_some());
        assert!(user.get("delete").is_some());
        assert_eq!(user["get"]["tags"][0], "user");
        assert_eq!(doc["info"]["title"], "School Events");
    }
}
