//! Services module
//!
//! This module contains business logic services

pub mod audit;
pub mod auth;
pub mod email;
pub mod event;
pub mod notification;
pub mod redis;
pub mod report;
pub mod reservation;
pub mod statistics;
pub mod user;
pub mod waiting_list;

// Re-export commonly used services
pub use audit::{AuditLogService, ChangelogEntry};
pub use auth::{AuthService, AuthContext, Permission, TokenKind, TokenPair};
pub use email::{EmailService, Mailer, SmtpMailer, BatchOutcome};
pub use event::EventService;
pub use notification::NotificationService;
pub use redis::RedisService;
pub use report::{ReportService, ExportFormat, ReportExport};
pub use reservation::ReservationService;
pub use statistics::StatisticsService;
pub use user::UserService;
pub use waiting_list::{WaitingListService, ProcessOutcome};

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::i18n::I18n;
use crate::tasks::TaskQueue;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone, Debug)]
pub struct ServiceFactory {
    pub db: DatabaseService,
    pub redis_service: RedisService,
    pub queue: TaskQueue,
    pub auth_service: AuthService,
    pub email_service: EmailService,
    pub notification_service: NotificationService,
    pub user_service: UserService,
    pub event_service: EventService,
    pub reservation_service: ReservationService,
    pub waiting_list_service: WaitingListService,
    pub statistics_service: StatisticsService,
    pub report_service: ReportService,
    pub audit_log_service: AuditLogService,
}

impl ServiceFactory {
    /// Create all services; SMTP is only set up when sending is enabled
    pub fn new(settings: Settings, db: DatabaseService, redis: RedisService, i18n: Arc<I18n>) -> Result<Self> {
        let mailer: Option<Arc<dyn Mailer>> = if settings.mail.enabled {
            Some(Arc::new(SmtpMailer::new(&settings.mail)?))
        } else {
            info!("Email sending disabled; outbox rows are marked sent without delivery");
            None
        };
        Ok(Self::with_mailer(settings, db, redis, i18n, mailer))
    }

    /// Create all services with an explicit mail transport
    pub fn with_mailer(
        settings: Settings,
        db: DatabaseService,
        redis: RedisService,
        i18n: Arc<I18n>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let queue = TaskQueue::new(redis.clone(), &settings.tasks);
        let auth_service = AuthService::new(settings.clone(), db.users.clone(), redis.clone());
        let email_service = EmailService::new(db.clone(), i18n, mailer, queue.clone(), settings.clone());
        let notification_service = NotificationService::new(db.notifications.clone());
        let user_service = UserService::new(
            db.clone(),
            email_service.clone(),
            notification_service.clone(),
            settings.clone(),
        );
        let event_service = EventService::new(db.clone(), auth_service.clone(), email_service.clone(), settings);
        let reservation_service = ReservationService::new(db.clone(), email_service.clone(), queue.clone());
        let waiting_list_service = WaitingListService::new(db.clone(), email_service.clone());
        let statistics_service = StatisticsService::new(db.statistics.clone());
        let report_service = ReportService::new(
            db.clone(),
            statistics_service.clone(),
            email_service.clone(),
            queue.clone(),
        );
        let audit_log_service = AuditLogService::new(db.audit_logs.clone());

        Self {
            db,
            redis_service: redis,
            queue,
            auth_service,
            email_service,
            notification_service,
            user_service,
            event_service,
            reservation_service,
            waiting_list_service,
            statistics_service,
            report_service,
            audit_log_service,
        }
    }

    /// Health check for the backing stores
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let database_healthy = self.db.health_check().await.is_ok();
        let redis_healthy = self.redis_service.health_check().await.unwrap_or(false);

        ServiceHealthStatus {
            database_healthy,
            redis_healthy,
            email_sending_enabled: self.email_service.sending_enabled(),
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    pub redis_healthy: bool,
    pub email_sending_enabled: bool,
}

impl ServiceHealthStatus {
    /// Database and Redis both reachable
    pub fn is_healthy(&self) -> bool {
        self.database_healthy && self.redis_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if !self.redis_healthy {
            issues.push("Redis connection failed".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_issues() {
        let status = ServiceHealthStatus {
            database_healthy: true,
            redis_healthy: false,
            email_sending_enabled: false,
        };
        assert!(!status.is_healthy());
        assert_eq!(status.get_issues(), vec!["Redis connection failed".to_string()]);
    }
}
