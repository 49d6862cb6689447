//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{SchoolEventsError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_app_config(&settings.app)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_auth_config(&settings.auth, settings.is_production())?;
    validate_mail_config(&settings.mail)?;
    validate_tasks_config(&settings.tasks)?;
    validate_i18n_config(&settings.i18n)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

fn validate_app_config(config: &super::AppConfig) -> Result<()> {
    let modes = ["development", "production", "testing"];
    if !modes.contains(&config.mode.as_str()) {
        return Err(SchoolEventsError::Config(format!(
            "Invalid mode: {}. Valid modes: {:?}",
            config.mode, modes
        )));
    }

    if !config.api_prefix.starts_with('/') {
        return Err(SchoolEventsError::Config(
            "API prefix must start with '/'".to_string()
        ));
    }

    for origin in &config.cors_origins {
        url::Url::parse(origin)
            .map_err(|e| SchoolEventsError::Config(format!("Invalid CORS origin {}: {}", origin, e)))?;
    }

    if config.lock_hours_before < 0 {
        return Err(SchoolEventsError::Config(
            "Lock hours cannot be negative".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    let has_url = config.url.as_deref().is_some_and(|u| !u.is_empty());
    if !has_url && (config.host.is_empty() || config.name.is_empty() || config.user.is_empty()) {
        return Err(SchoolEventsError::Config(
            "Database URL or host, user and name are required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(SchoolEventsError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(SchoolEventsError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SchoolEventsError::Config(
            "Redis URL is required".to_string()
        ));
    }

    Ok(())
}

fn validate_auth_config(config: &super::AuthConfig, production: bool) -> Result<()> {
    if config.secret_key.is_empty() {
        return Err(SchoolEventsError::Config(
            "Secret key is required".to_string()
        ));
    }

    if production && config.secret_key.len() < 32 {
        return Err(SchoolEventsError::Config(
            "Secret key must be at least 32 characters in production".to_string()
        ));
    }

    if !["HS256", "HS384", "HS512"].contains(&config.algorithm.as_str()) {
        return Err(SchoolEventsError::Config(format!(
            "Unsupported token algorithm: {}",
            config.algorithm
        )));
    }

    if config.access_token_expire_minutes <= 0 || config.refresh_token_expire_minutes <= 0 {
        return Err(SchoolEventsError::Config(
            "Token lifetimes must be greater than 0".to_string()
        ));
    }

    if config.max_failed_logins == 0 {
        return Err(SchoolEventsError::Config(
            "Max failed logins must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_mail_config(config: &super::MailConfig) -> Result<()> {
    if config.enabled && config.server.is_empty() {
        return Err(SchoolEventsError::Config(
            "Mail server is required when sending notifications".to_string()
        ));
    }

    if config.batch_size <= 0 {
        return Err(SchoolEventsError::Config(
            "Mail batch size must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_tasks_config(config: &super::TasksConfig) -> Result<()> {
    if config.queue_name.is_empty() || config.dead_letter_queue.is_empty() {
        return Err(SchoolEventsError::Config(
            "Queue names are required".to_string()
        ));
    }

    if config.queue_name == config.dead_letter_queue {
        return Err(SchoolEventsError::Config(
            "Dead letter queue must differ from the work queue".to_string()
        ));
    }

    if config.worker_concurrency == 0 {
        return Err(SchoolEventsError::Config(
            "Worker concurrency must be greater than 0".to_string()
        ));
    }

    if config.daily_run_hour > 23 {
        return Err(SchoolEventsError::Config(
            "Daily run hour must be between 0 and 23".to_string()
        ));
    }

    Ok(())
}

/// Validate internationalization configuration
fn validate_i18n_config(config: &super::I18nConfig) -> Result<()> {
    if config.default_language.is_empty() {
        return Err(SchoolEventsError::Config(
            "Default language is required".to_string()
        ));
    }

    if config.supported_languages.is_empty() {
        return Err(SchoolEventsError::Config(
            "At least one supported language is required".to_string()
        ));
    }

    if !config.supported_languages.contains(&config.default_language) {
        return Err(SchoolEventsError::Config(
            "Default language must be in supported languages list".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(SchoolEventsError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    let base_level = config.level.split(',').next().unwrap_or_default();
    if !valid_levels.contains(&base_level) {
        return Err(SchoolEventsError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_secret_in_production() {
        let mut settings = Settings::default();
        settings.app.mode = "production".into();
        settings.auth.secret_key = "short".into();
        assert!(validate_settings(&settings).is_err());

        settings.auth.secret_key = "x".repeat(40);
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_rejects_mail_without_server() {
        let mut settings = Settings::default();
        settings.mail.enabled = true;
        assert!(validate_settings(&settings).is_err());

        settings.mail.server = "smtp.example.com".into();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_rejects_unknown_language_and_level() {
        let mut settings = Settings::default();
        settings.i18n.default_language = "de".into();
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.logging.level = "verbose".into();
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.logging.level = "info,sqlx=warn".into();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_rejects_bad_pool_bounds() {
        let mut settings = Settings::default();
        settings.database.min_connections = 40;
        assert!(validate_settings(&settings).is_err());
    }
}
