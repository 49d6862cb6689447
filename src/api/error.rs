//! HTTP mapping of `SchoolEventsError` and extractor rejections

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    extract::FromRequest,
    extract::FromRequestParts,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, info};

use crate::api::response::GenericResponse;
use crate::utils::errors::SchoolEventsError;
use crate::utils::logging::log_api_error;

impl IntoResponse for SchoolEventsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.public_message();

        if status.is_server_error() {
            log_api_error("http", &self.to_string(), None);
            error!(status = status.as_u16(), severity = %self.severity(), error = %self, "Request failed");
        } else {
            info!(status = status.as_u16(), detail = %detail, "Request rejected");
        }

        GenericResponse::<()>::error(status, detail).into_response()
    }
}

impl From<JsonRejection> for SchoolEventsError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::UNPROCESSABLE_ENTITY => SchoolEventsError::Validation(rejection.body_text()),
            _ => SchoolEventsError::BadRequest(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for SchoolEventsError {
    fn from(rejection: QueryRejection) -> Self {
        SchoolEventsError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for SchoolEventsError {
    fn from(rejection: FormRejection) -> Self {
        SchoolEventsError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for SchoolEventsError {
    fn from(rejection: PathRejection) -> Self {
        SchoolEventsError::Validation(rejection.body_text())
    }
}

/// `Json` whose rejection uses the envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(SchoolEventsError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(SchoolEventsError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(SchoolEventsError))]
pub struct ApiForm<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(SchoolEventsError))]
pub struct ApiPath<T>(pub T);
