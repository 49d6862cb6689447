//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! shared by the API, worker, beat and seed processes.

use tracing::{info, warn, error, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::utils::errors::{SchoolEventsError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file appender and must be held for the
/// lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.level))
        .map_err(|e| SchoolEventsError::Config(format!("Invalid log filter: {}", e)))?;

    let stdout_layer = if config.json {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stdout).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
        .try_init()
        .map_err(|e| SchoolEventsError::Config(format!("Logging already initialized: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log user actions with structured data
pub fn log_user_action(user_id: i64, action: &str, details: Option<&str>) {
    info!(
        user_id = user_id,
        action = action,
        details = details,
        "User action performed"
    );
}

/// Log event management actions
pub fn log_event_action(event_id: i64, action: &str, user_id: i64, details: Option<&str>) {
    info!(
        event_id = event_id,
        action = action,
        user_id = user_id,
        details = details,
        "Event action performed"
    );
}

/// Log reservation lifecycle changes
pub fn log_reservation_action(reservation_id: i64, action: &str, user_id: i64, seats: i32) {
    info!(
        reservation_id = reservation_id,
        action = action,
        user_id = user_id,
        seats = seats,
        "Reservation action performed"
    );
}

/// Log admin actions
pub fn log_admin_action(admin_id: i64, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_id = admin_id,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}

/// Log authentication attempts
pub fn log_auth_attempt(email: &str, success: bool, reason: Option<&str>) {
    if success {
        info!(email = email, "Login succeeded");
    } else {
        warn!(email = email, reason = reason, "Login failed");
    }
}

/// Log background task outcomes
pub fn log_task_event(task: &str, job_id: &str, attempts: u32, success: bool, details: Option<&str>) {
    if success {
        info!(
            task = task,
            job_id = job_id,
            attempts = attempts,
            details = details,
            "Task completed"
        );
    } else {
        error!(
            task = task,
            job_id = job_id,
            attempts = attempts,
            details = details,
            "Task failed"
        );
    }
}

/// Log database operations
pub fn log_database_operation(operation: &str, table: &str, duration_ms: u64, success: bool) {
    if success {
        debug!(
            operation = operation,
            table = table,
            duration_ms = duration_ms,
            "Database operation completed"
        );
    } else {
        error!(
            operation = operation,
            table = table,
            duration_ms = duration_ms,
            "Database operation failed"
        );
    }
}
