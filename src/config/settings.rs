//! Application settings management
//!
//! Settings are layered: built-in defaults, an optional `config.toml`,
//! `SCHOOL_EVENTS__SECTION__KEY` environment variables and finally the flat
//! deployment variables used by the compose files (`DATABASE_USER`,
//! `MAIL_SERVER`, `SENDING_NOTIFICATIONS`, ...).

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub tasks: TasksConfig,
    pub i18n: I18nConfig,
    pub logging: LoggingConfig,
}

/// HTTP server and deployment configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub project_name: String,
    /// development, production or testing
    pub mode: String,
    pub host: String,
    pub port: u16,
    pub api_version: String,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    /// Public base URL of the frontend, used for links in emails
    pub external_url: Option<String>,
    pub files_dir: String,
    pub admin_email: Option<String>,
    pub admin_id: Option<i64>,
    /// Default number of hours before an event date when bookings close
    pub lock_hours_before: i64,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Authentication and API docs access configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub secret_key: String,
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_minutes: i64,
    pub file_token_expire_minutes: i64,
    pub docs_login: String,
    pub docs_password: String,
    pub max_failed_logins: u32,
    pub failed_login_window_seconds: u64,
    pub lockout_seconds: u64,
    /// Login attempts allowed per client IP and minute
    pub login_requests_per_minute: u32,
}

/// SMTP configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    /// When false emails are rendered and logged but not handed to SMTP
    pub enabled: bool,
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub from_name: String,
    pub batch_size: i64,
    pub max_retries: i32,
}

/// Task queue, worker and beat configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TasksConfig {
    pub queue_name: String,
    pub dead_letter_queue: String,
    pub max_retries: u32,
    pub poll_timeout_seconds: u64,
    pub worker_concurrency: usize,
    pub pending_emails_interval_seconds: u64,
    pub waiting_list_interval_seconds: u64,
    pub complete_dates_interval_seconds: u64,
    pub cleanup_interval_seconds: u64,
    /// Local hour at which the daily jobs run
    pub daily_run_hour: u32,
    pub notification_retention_days: i64,
}

/// Internationalization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I18nConfig {
    pub default_language: String,
    pub supported_languages: Vec<String>,
    pub translations_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("SCHOOL_EVENTS")
                    .prefix_separator("__")
                    .separator("__"),
            );

        let builder = apply_deployment_env(builder)?;
        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.app.cors_origins.extend(deployment_cors_origins());
        settings.app.cors_origins.dedup();

        Ok(settings)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::SchoolEventsError> {
        super::validation::validate_settings(self)
    }

    /// Connection string for the PostgreSQL pool
    pub fn database_url(&self) -> String {
        match &self.database.url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!(
                "postgresql://{}:{}@{}:{}/{}",
                urlencoding::encode(&self.database.user),
                urlencoding::encode(&self.database.password),
                self.database.host,
                self.database.port,
                self.database.name
            ),
        }
    }

    pub fn is_production(&self) -> bool {
        self.app.mode == "production"
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Map the flat variables used by docker-compose onto settings keys
fn apply_deployment_env(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    const MAPPING: &[(&str, &str)] = &[
        ("PROJECT_NAME", "app.project_name"),
        ("MODE", "app.mode"),
        ("API_VERSION", "app.api_version"),
        ("API_V1_STR", "app.api_prefix"),
        ("EXT_ENDPOINT1", "app.external_url"),
        ("FILES_DIR", "app.files_dir"),
        ("ADMIN_EMAIL", "app.admin_email"),
        ("ADMIN_ID", "app.admin_id"),
        ("DATABASE_URI", "database.url"),
        ("DATABASE_HOST", "database.host"),
        ("DATABASE_PORT", "database.port"),
        ("DATABASE_USER", "database.user"),
        ("DATABASE_PASSWORD", "database.password"),
        ("DATABASE_NAME", "database.name"),
        ("REDIS_URL", "redis.url"),
        ("SECRET_KEY", "auth.secret_key"),
        ("ALGORITHM", "auth.algorithm"),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", "auth.access_token_expire_minutes"),
        ("REFRESH_TOKEN_EXPIRE_MINUTES", "auth.refresh_token_expire_minutes"),
        ("API_LOGIN", "auth.docs_login"),
        ("API_PASSWORD", "auth.docs_password"),
        ("SENDING_NOTIFICATIONS", "mail.enabled"),
        ("MAIL_SERVER", "mail.server"),
        ("MAIL_PORT", "mail.port"),
        ("MAIL_USERNAME", "mail.username"),
        ("MAIL_PASSWORD", "mail.password"),
        ("MAIL_FROM", "mail.from"),
        ("MAIL_FROM_NAME", "mail.from_name"),
        ("LOG_LEVEL", "logging.level"),
    ];

    let mut builder = builder;
    for (var, key) in MAPPING {
        builder = builder.set_override_option(*key, env_value(var))?;
    }
    Ok(builder)
}

/// Origins from `BACKEND_CORS_ORIGINS` plus the local and external frontends
fn deployment_cors_origins() -> Vec<String> {
    let mut origins: Vec<String> = env_value("BACKEND_CORS_ORIGINS")
        .map(|raw| parse_origin_list(&raw))
        .unwrap_or_default();

    for var in ["LOCAL_1", "LOCAL_2", "EXT_ENDPOINT1"] {
        if let Some(origin) = env_value(var) {
            origins.push(origin.trim_end_matches('/').to_string());
        }
    }
    origins
}

/// Accepts either a comma separated list or a JSON array
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list.into_iter().map(|o| o.trim_end_matches('/').to_string()).collect();
        }
    }
    trimmed
        .split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppConfig {
                project_name: "School Events".to_string(),
                mode: "development".to_string(),
                host: "0.0.0.0".to_string(),
                port: 8000,
                api_version: "v1".to_string(),
                api_prefix: "/api/v1".to_string(),
                cors_origins: vec![],
                external_url: None,
                files_dir: "files".to_string(),
                admin_email: None,
                admin_id: None,
                lock_hours_before: 48,
            },
            database: DatabaseConfig {
                url: None,
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                name: "school_events".to_string(),
                max_connections: 30,
                min_connections: 1,
                acquire_timeout_seconds: 30,
                idle_timeout_seconds: 600,
                max_lifetime_seconds: 900,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "school_events:".to_string(),
                ttl_seconds: 3600,
            },
            auth: AuthConfig {
                secret_key: "change-me-in-production".to_string(),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: 5,
                refresh_token_expire_minutes: 30,
                file_token_expire_minutes: 60,
                docs_login: "admin".to_string(),
                docs_password: "admin".to_string(),
                max_failed_logins: 5,
                failed_login_window_seconds: 900,
                lockout_seconds: 900,
                login_requests_per_minute: 30,
            },
            mail: MailConfig {
                enabled: false,
                server: String::new(),
                port: 587,
                username: String::new(),
                password: String::new(),
                from: "noreply@example.com".to_string(),
                from_name: "School Events".to_string(),
                batch_size: 50,
                max_retries: 3,
            },
            tasks: TasksConfig {
                queue_name: "default".to_string(),
                dead_letter_queue: "dead".to_string(),
                max_retries: 3,
                poll_timeout_seconds: 5,
                worker_concurrency: 4,
                pending_emails_interval_seconds: 60,
                waiting_list_interval_seconds: 30,
                complete_dates_interval_seconds: 300,
                cleanup_interval_seconds: 3600,
                daily_run_hour: 5,
                notification_retention_days: 90,
            },
            i18n: I18nConfig {
                default_language: "sk".to_string(),
                supported_languages: vec!["en".to_string(), "sk".to_string(), "cz".to_string()],
                translations_dir: "translations".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
                file_prefix: "school-events.log".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_is_built_from_parts() {
        let mut settings = Settings::default();
        settings.database.user = "app".into();
        settings.database.password = "p@ss".into();
        settings.database.host = "db".into();
        settings.database.name = "events".into();
        assert_eq!(settings.database_url(), "postgresql://app:p%40ss@db:5432/events");

        settings.database.url = Some("postgresql://explicit/db".into());
        assert_eq!(settings.database_url(), "postgresql://explicit/db");
    }

    #[test]
    fn test_parse_origin_list() {
        assert_eq!(
            parse_origin_list("http://localhost:3000/, https://example.com"),
            vec!["http://localhost:3000", "https://example.com"]
        );
        assert_eq!(
            parse_origin_list(r#"["http://a.sk", "http://b.sk/"]"#),
            vec!["http://a.sk", "http://b.sk"]
        );
        assert!(parse_origin_list("  ").is_empty());
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.bind_address(), "0.0.0.0:8000");
        assert!(!settings.is_production());
    }
}
