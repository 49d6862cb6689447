//! Middleware module
//!
//! This module contains middleware for request processing

pub mod auth;
pub mod logging;
pub mod rate_limit;

// Re-export commonly used middleware
pub use auth::{require_docs_auth, AuthMiddleware};
pub use logging::{current_api_id, log_requests, RequestMeta};
pub use rate_limit::{limit_requests, RateLimitMiddleware};
