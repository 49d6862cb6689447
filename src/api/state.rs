use std::sync::Arc;

use crate::config::Settings;
use crate::middleware::{AuthMiddleware, RateLimitMiddleware};
use crate::services::ServiceFactory;

/// Shared state of the HTTP API
#[derive(Clone, Debug)]
pub struct AppState {
    pub services: Arc<ServiceFactory>,
    pub settings: Arc<Settings>,
    pub docs_auth: AuthMiddleware,
    pub login_limiter: RateLimitMiddleware,
}

impl AppState {
    pub fn new(services: ServiceFactory, settings: Settings) -> Self {
        Self {
            docs_auth: AuthMiddleware::new(&settings.auth),
            login_limiter: RateLimitMiddleware::per_minute(settings.auth.login_requests_per_minute),
            services: Arc::new(services),
            settings: Arc::new(settings),
        }
    }
}
