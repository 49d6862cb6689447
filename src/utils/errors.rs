//! Error handling for School Events
//!
//! This module defines the main error type used throughout the application
//! and the mapping of every variant to the HTTP status and detail message
//! returned to API clients.

use chrono::{DateTime, Utc};
use chrono_tz::Europe::Bratislava;
use http::StatusCode;
use thiserror::Error;

/// Main error type for the School Events backend
#[derive(Error, Debug)]
pub enum SchoolEventsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("{}", locked_message(.until))]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account pending approval")]
    AccountPendingApproval,

    #[error("{0}")]
    PermissionDenied(String),

    #[error("User not found")]
    UserNotFound { user_id: i64 },

    #[error("Event not found")]
    EventNotFound { event_id: i64 },

    #[error("Event date not found")]
    EventDateNotFound { event_date_id: i64 },

    #[error("Reservation not found")]
    ReservationNotFound { reservation_id: i64 },

    #[error("Waiting list entry not found")]
    WaitingListEntryNotFound { entry_id: i64 },

    #[error("Report not found")]
    ReportNotFound { report_id: i64 },

    #[error("Claim not found")]
    ClaimNotFound { claim_id: i64 },

    #[error("Notification not found")]
    NotificationNotFound { notification_id: i64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("Too many requests")]
    RateLimitExceeded,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for School Events operations
pub type Result<T> = std::result::Result<T, SchoolEventsError>;

/// Format the lock expiry the way users in Slovakia read it
fn locked_message(until: &DateTime<Utc>) -> String {
    format!(
        "Account is locked. Please try again after {}.",
        until.with_timezone(&Bratislava).format("%d.%m.%Y %H:%M:%S")
    )
}

impl SchoolEventsError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SchoolEventsError::Database(_) => true,
            SchoolEventsError::Migration(_) => false,
            SchoolEventsError::Redis(_) => true,
            SchoolEventsError::Serialization(_) => false,
            SchoolEventsError::Io(_) => true,
            SchoolEventsError::UrlParse(_) => false,
            SchoolEventsError::Jwt(_) => false,
            SchoolEventsError::Mail(_) => true,
            SchoolEventsError::Config(_) => false,
            SchoolEventsError::Authentication(_) => false,
            SchoolEventsError::AccountLocked { .. } => true,
            SchoolEventsError::AccountPendingApproval => false,
            SchoolEventsError::PermissionDenied(_) => false,
            SchoolEventsError::UserNotFound { .. }
            | SchoolEventsError::EventNotFound { .. }
            | SchoolEventsError::EventDateNotFound { .. }
            | SchoolEventsError::ReservationNotFound { .. }
            | SchoolEventsError::WaitingListEntryNotFound { .. }
            | SchoolEventsError::ReportNotFound { .. }
            | SchoolEventsError::ClaimNotFound { .. }
            | SchoolEventsError::NotificationNotFound { .. } => false,
            SchoolEventsError::InvalidStateTransition { .. } => false,
            SchoolEventsError::BadRequest(_) => false,
            SchoolEventsError::Validation(_) => false,
            SchoolEventsError::RateLimitExceeded => true,
            SchoolEventsError::ServiceUnavailable(_) => true,
            SchoolEventsError::Internal(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SchoolEventsError::Database(_) => ErrorSeverity::Critical,
            SchoolEventsError::Migration(_) => ErrorSeverity::Critical,
            SchoolEventsError::Config(_) => ErrorSeverity::Critical,
            SchoolEventsError::PermissionDenied(_) => ErrorSeverity::Warning,
            SchoolEventsError::Authentication(_) | SchoolEventsError::Jwt(_) => ErrorSeverity::Warning,
            SchoolEventsError::AccountLocked { .. } => ErrorSeverity::Warning,
            SchoolEventsError::RateLimitExceeded => ErrorSeverity::Warning,
            SchoolEventsError::BadRequest(_)
            | SchoolEventsError::Validation(_)
            | SchoolEventsError::AccountPendingApproval
            | SchoolEventsError::InvalidStateTransition { .. } => ErrorSeverity::Info,
            e if e.is_not_found() => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// Whether the error reports a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchoolEventsError::UserNotFound { .. }
                | SchoolEventsError::EventNotFound { .. }
                | SchoolEventsError::EventDateNotFound { .. }
                | SchoolEventsError::ReservationNotFound { .. }
                | SchoolEventsError::WaitingListEntryNotFound { .. }
                | SchoolEventsError::ReportNotFound { .. }
                | SchoolEventsError::ClaimNotFound { .. }
                | SchoolEventsError::NotificationNotFound { .. }
        )
    }

    /// HTTP status code reported to API clients
    pub fn status_code(&self) -> StatusCode {
        match self {
            SchoolEventsError::Authentication(_) | SchoolEventsError::Jwt(_) => StatusCode::UNAUTHORIZED,
            SchoolEventsError::AccountLocked { .. }
            | SchoolEventsError::AccountPendingApproval
            | SchoolEventsError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            SchoolEventsError::BadRequest(_) | SchoolEventsError::InvalidStateTransition { .. } => {
                StatusCode::BAD_REQUEST
            }
            e if e.is_not_found() => StatusCode::BAD_REQUEST,
            SchoolEventsError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SchoolEventsError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Detail message safe to show to API clients
    pub fn public_message(&self) -> String {
        match self {
            SchoolEventsError::Authentication(msg) if !msg.is_empty() => msg.clone(),
            SchoolEventsError::Authentication(_) | SchoolEventsError::Jwt(_) => {
                "Invalid authentication credentials".to_string()
            }
            e if e.status_code() == StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error".to_string(),
            e => e.to_string(),
        }
    }

    /// Shorthand for an authentication failure with the default message
    pub fn invalid_credentials() -> Self {
        SchoolEventsError::Authentication("Invalid authentication credentials".to_string())
    }
}

impl From<lettre::error::Error> for SchoolEventsError {
    fn from(e: lettre::error::Error) -> Self {
        SchoolEventsError::Mail(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for SchoolEventsError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        SchoolEventsError::Mail(e.to_string())
    }
}

impl From<lettre::address::AddressError> for SchoolEventsError {
    fn from(e: lettre::address::AddressError) -> Self {
        SchoolEventsError::Mail(e.to_string())
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_account_locked_message_uses_bratislava_time() {
        // 10:00 UTC in July is 12:00 CEST
        let until = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
        let err = SchoolEventsError::AccountLocked { until };
        assert_eq!(
            err.to_string(),
            "Account is locked. Please try again after 01.07.2024 12:00:00."
        );
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(SchoolEventsError::EventNotFound { event_id: 1 }.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(SchoolEventsError::Validation("x".into()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(SchoolEventsError::invalid_credentials().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(SchoolEventsError::Internal("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_public_message_hides_internal_details() {
        let err = SchoolEventsError::Config("secret missing".into());
        assert_eq!(err.public_message(), "Internal Server Error");

        let err = SchoolEventsError::EventNotFound { event_id: 7 };
        assert_eq!(err.public_message(), "Event not found");

        let err = SchoolEventsError::Authentication(String::new());
        assert_eq!(err.public_message(), "Invalid authentication credentials");
    }

    #[test]
    fn test_severity() {
        assert_eq!(SchoolEventsError::RateLimitExceeded.severity(), ErrorSeverity::Warning);
        assert_eq!(SchoolEventsError::UserNotFound { user_id: 1 }.severity(), ErrorSeverity::Info);
        assert_eq!(SchoolEventsError::Config("x".into()).severity(), ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }
}
