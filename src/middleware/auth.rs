//! Authentication middleware
//!
//! HTTP basic authentication in front of the API documentation. Bearer
//! tokens for the API itself are handled by the `CurrentUser` extractor.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use constant_time_eq::constant_time_eq;
use tracing::debug;

use crate::api::response::GenericResponse;
use crate::config::settings::AuthConfig;
use crate::middleware::logging::log_security_event;

pub const DOCS_REALM: &str = "Basic realm=\"Access to the API docs\"";

/// Docs credentials
#[derive(Clone, Debug)]
pub struct AuthMiddleware {
    login: String,
    password: String,
}

impl AuthMiddleware {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            login: config.docs_login.clone(),
            password: config.docs_password.clone(),
        }
    }

    /// Compare an `Authorization: Basic` header against the docs credentials
    pub fn check_basic(&self, headers: &HeaderMap) -> bool {
        let Some((login, password)) = basic_credentials(headers) else {
            return false;
        };
        // both comparisons always run
        let login_ok = constant_time_eq(login.as_bytes(), self.login.as_bytes());
        let password_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        login_ok & password_ok
    }
}

/// Decode `Authorization: Basic base64(login:password)`
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (login, password) = decoded.split_once(':')?;
    Some((login.to_string(), password.to_string()))
}

/// `from_fn_with_state` adapter guarding the docs routes
pub async fn require_docs_auth(State(auth): State<AuthMiddleware>, request: Request, next: Next) -> Response {
    if auth.check_basic(request.headers()) {
        debug!(path = %request.uri().path(), "Docs access granted");
        return next.run(request).await;
    }

    log_security_event("docs_auth_failed", None, request.uri().path());
    let body = GenericResponse::<()>::error(StatusCode::UNAUTHORIZED, "Incorrect login or password");
    let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(DOCS_REALM));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        let mut config = crate::config::Settings::default().auth;
        config.docs_login = "docs".into();
        config.docs_password = "s3cret".into();
        config
    }

    fn basic(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = format!("Basic {}", STANDARD.encode(value));
        headers.insert(header::AUTHORIZATION, encoded.parse().unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials_decoding() {
        assert_eq!(
            basic_credentials(&basic("docs:pa:ss")),
            Some(("docs".to_string(), "pa:ss".to_string()))
        );
        assert_eq!(basic_credentials(&HeaderMap::new()), None);

        let mut bearer = HeaderMap::new();
        bearer.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(basic_credentials(&bearer), None);
    }

    #[test]
    fn test_docs_credentials_check() {
        let auth = AuthMiddleware::new(&config());
        assert!(auth.check_basic(&basic("docs:s3cret")));
        assert!(!auth.check_basic(&basic("docs:wrong")));
        assert!(!auth.check_basic(&basic("admin:s3cret")));
        assert!(!auth.check_basic(&HeaderMap::new()));
    }
}
