//! Health checks, signed file downloads and the fallback route

use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::api::error::{ApiPath, ApiQuery};
use crate::api::response::GenericResponse;
use crate::api::state::AppState;
use crate::services::ServiceHealthStatus;
use crate::utils::errors::{Result, SchoolEventsError};

/// Liveness
pub async fn health() -> GenericResponse<Value> {
    GenericResponse::ok("OK", json!({ "status": "ok", "version": crate::VERSION }))
}

/// Database and Redis reachability
pub async fn service_health(State(state): State<AppState>) -> GenericResponse<ServiceHealthStatus> {
    let status = state.services.health_check().await;
    if status.is_healthy() {
        return GenericResponse::ok("All services healthy", status);
    }
    let message = status.get_issues().join("; ");
    let mut response = GenericResponse::ok(message.clone(), status);
    response.error = Some(message);
    response.status_code = StatusCode::SERVICE_UNAVAILABLE.as_u16();
    response
}

#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    pub token: Option<String>,
}

/// Relative path below the files directory; `None` when it escapes it
pub fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    let path = Path::new(raw.trim_start_matches('/'));
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// `GET /files/{path}?token=`
pub async fn serve_file(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<String>,
    ApiQuery(query): ApiQuery<FileQuery>,
    request: Request,
) -> Result<Response> {
    let token = query.token.ok_or_else(SchoolEventsError::invalid_credentials)?;
    state.services.auth_service.verify_file_token(&token, &path)?;

    let relative = safe_relative_path(&path)
        .ok_or_else(|| SchoolEventsError::BadRequest("Invalid file path".to_string()))?;
    let full = Path::new(&state.settings.app.files_dir).join(relative);
    debug!(path = %full.display(), "Serving file");

    let response = ServeFile::new(full)
        .oneshot(request)
        .await
        .map_err(|e| SchoolEventsError::Internal(e.to_string()))?;
    Ok(response.map(Body::new).into_response())
}

/// Unknown routes answer 400 in the envelope
pub async fn route_not_found(uri: Uri) -> SchoolEventsError {
    SchoolEventsError::BadRequest(format!("Route not found: {}", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(safe_relative_path("events/1/poster.png"), Some(PathBuf::from("events/1/poster.png")));
        assert_eq!(safe_relative_path("/events/./a.pdf"), Some(PathBuf::from("events/a.pdf")));
        assert_eq!(safe_relative_path("../etc/passwd"), None);
        assert_eq!(safe_relative_path("events/../../secret"), None);
        assert_eq!(safe_relative_path(""), None);
    }

    #[tokio::test]
    async fn test_fallback_message() {
        let response = route_not_found("/api/v1/nope".parse().unwrap()).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Route not found: /api/v1/nope");
    }
}
