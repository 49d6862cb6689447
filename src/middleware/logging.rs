//! Request logging middleware
//!
//! Every request gets an `api_id`, a tracing span and a completion log line
//! with its duration. The id is also exposed to response builders through a
//! task-local so success and error envelopes carry the same value.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Requests slower than this are reported at warn level
const SLOW_REQUEST_MS: u128 = 1000;

tokio::task_local! {
    static API_ID: Uuid;
}

/// The id of the request being served, or a fresh one outside a request
pub fn current_api_id() -> Uuid {
    API_ID.try_with(|id| *id).unwrap_or_else(|_| Uuid::new_v4())
}

/// Identifiers of one request, stored in the request extensions
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub api_id: Uuid,
    pub request_id: String,
    pub user_id: Option<String>,
}

impl RequestMeta {
    fn from_request(request: &Request) -> Self {
        let api_id = Uuid::new_v4();
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            api_id,
            request_id: header(REQUEST_ID_HEADER).unwrap_or_else(|| api_id.to_string()),
            user_id: header(USER_ID_HEADER),
        }
    }
}

/// Log request start and end
pub async fn log_requests(mut request: Request, next: Next) -> Response {
    let meta = RequestMeta::from_request(&request);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "request",
        api_id = %meta.api_id,
        request_id = %meta.request_id,
        user_id = meta.user_id.as_deref().unwrap_or("-"),
        method = %method,
        path = %path,
    );

    let api_id = meta.api_id;
    let request_id = meta.request_id.clone();
    request.extensions_mut().insert(meta);

    let started = Instant::now();
    let mut response = API_ID
        .scope(api_id, async move {
            debug!("Request started");
            next.run(request).await
        })
        .instrument(span.clone())
        .await;

    let duration_ms = started.elapsed().as_millis();
    let status = response.status().as_u16();
    span.in_scope(|| {
        if duration_ms > SLOW_REQUEST_MS {
            warn!(status, duration_ms = duration_ms as u64, "Slow request");
        } else {
            info!(status, duration_ms = duration_ms as u64, "Request finished");
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Security relevant events such as rejected docs credentials
pub fn log_security_event(event_type: &str, client: Option<&str>, details: &str) {
    warn!(
        event_type = event_type,
        client = client,
        details = details,
        "Security event detected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let app = Router::new()
            .route("/", get(|| async { current_api_id().to_string() }))
            .layer(axum::middleware::from_fn(log_requests));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "abc-123");
    }

    #[test]
    fn test_api_id_outside_request_is_fresh() {
        assert_ne!(current_api_id(), current_api_id());
    }
}
