//! Database service layer
//!
//! This module provides a high-level interface to database operations

use sqlx::{PgConnection, Postgres, Transaction};
use crate::database::{
    DatabasePool, UserRepository, SchoolRepository, EventRepository, EventDateRepository, ReservationRepository,
    WaitingListRepository, NotificationRepository, EmailLogRepository, ReportRepository, AuditLogRepository,
    StatisticsRepository,
};
use crate::models::NewAuditLog;
use crate::utils::errors::SchoolEventsError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: DatabasePool,
    pub users: UserRepository,
    pub schools: SchoolRepository,
    pub events: EventRepository,
    pub event_dates: EventDateRepository,
    pub reservations: ReservationRepository,
    pub waiting_list: WaitingListRepository,
    pub notifications: NotificationRepository,
    pub email_logs: EmailLogRepository,
    pub reports: ReportRepository,
    pub audit_logs: AuditLogRepository,
    pub statistics: StatisticsRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            schools: SchoolRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            event_dates: EventDateRepository::new(pool.clone()),
            reservations: ReservationRepository::new(pool.clone()),
            waiting_list: WaitingListRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            email_logs: EmailLogRepository::new(pool.clone()),
            reports: ReportRepository::new(pool.clone()),
            audit_logs: AuditLogRepository::new(pool.clone()),
            statistics: StatisticsRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Start a transaction; dropped without commit it rolls back
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, SchoolEventsError> {
        Ok(self.pool.begin().await?)
    }

    /// Record an audit entry inside the caller's transaction
    pub async fn audit(&self, conn: &mut PgConnection, entry: NewAuditLog) -> Result<(), SchoolEventsError> {
        tracing::debug!(
            table = %entry.table_name,
            primary_key = %entry.table_primary_key,
            "Recording audit entry"
        );
        self.audit_logs.record(conn, &entry).await
    }

    pub async fn health_check(&self) -> Result<(), SchoolEventsError> {
        crate::database::health_check(&self.pool).await
    }

    /// Clean up expired data
    pub async fn cleanup_expired_data(&self, retention_days: i64) -> Result<serde_json::Value, SchoolEventsError> {
        let notifications = self.notifications.purge_older_than(retention_days).await?;
        let emails = self.email_logs.purge_sent_older_than(retention_days).await?;

        let cleanup_result = serde_json::json!({
            "notifications_removed": notifications,
            "sent_emails_removed": emails
        });

        Ok(cleanup_result)
    }
}
