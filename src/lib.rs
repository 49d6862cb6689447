//! School Events backend
//!
//! Reservation platform for school cultural events: an HTTP API, a
//! background worker and a periodic scheduler sharing PostgreSQL and Redis.
//! This library holds the components all three binaries are built from.

pub mod api;
pub mod config;
pub mod database;
pub mod i18n;
pub mod middleware;
pub mod models;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{SchoolEventsError, Result};

// Re-export main components for easy access
pub use api::{create_router, AppState};
pub use database::DatabaseService;
pub use i18n::I18n;
pub use services::ServiceFactory;
pub use tasks::{TaskQueue, Worker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
