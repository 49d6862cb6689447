//! Response envelope shared by every JSON endpoint

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::logging::current_api_id;
use crate::utils::errors::SchoolEventsError;

pub type ApiResult<T> = Result<GenericResponse<T>, SchoolEventsError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericResponse<T> {
    pub api_id: Uuid,
    pub error: Option<String>,
    pub message: Option<String>,
    pub data: Option<T>,
    pub status_code: u16,
    pub unread_notification: bool,
}

impl<T> GenericResponse<T> {
    fn with_status(status: StatusCode, message: Option<String>, data: Option<T>) -> Self {
        Self {
            api_id: current_api_id(),
            error: None,
            message,
            data,
            status_code: status.as_u16(),
            unread_notification: false,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, Some(message.into()), Some(data))
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, Some(message.into()), Some(data))
    }

    /// Error envelope: `error` and `message` both carry the detail
    pub fn error(status: StatusCode, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            error: Some(detail.clone()),
            ..Self::with_status(status, Some(detail), None)
        }
    }

    pub fn with_unread(mut self, unread_notification: bool) -> Self {
        self.unread_notification = unread_notification;
        self
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK)
    }
}

impl<T: Serialize> IntoResponse for GenericResponse<T> {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// A file download
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.filename.replace('"', ""));
        let mut response = (StatusCode::OK, self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_shape() {
        let body = serde_json::to_value(GenericResponse::ok("Done", json!({"id": 1})).with_unread(true)).unwrap();
        assert_eq!(body["message"], "Done");
        assert_eq!(body["error"], serde_json::Value::Null);
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(body["status_code"], 200);
        assert_eq!(body["unread_notification"], true);
        assert!(body["api_id"].is_string());
    }

    #[test]
    fn test_error_envelope_repeats_detail() {
        let envelope = GenericResponse::<()>::error(StatusCode::BAD_REQUEST, "Event not found");
        assert_eq!(envelope.error.as_deref(), Some("Event not found"));
        assert_eq!(envelope.message.as_deref(), Some("Event not found"));
        assert!(envelope.data.is_none());
        assert_eq!(envelope.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_download_headers() {
        let response = Download {
            filename: "report_1.csv".into(),
            content_type: "text/csv",
            body: b"a,b\n".to_vec(),
        }
        .into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"report_1.csv\""
        );
    }
}
