//! In-app notification and email outbox repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::{Duration, Utc};
use crate::database::filters::{fetch_page, Column, ColumnKind, FilterSet, PageRequest, Pagination, TableSpec};
use crate::models::notification::{
    CreateNotificationRequest, EmailLog, EmailStatus, NewEmailLog, Notification, NotificationStatus,
};
use crate::utils::errors::SchoolEventsError;

pub const NOTIFICATIONS: TableSpec = TableSpec {
    table: "notifications",
    primary_key: "notification_id",
    columns: &[
        Column::new("notification_id", ColumnKind::Integer),
        Column::new("notification_content", ColumnKind::Text),
        Column::new("notification_date", ColumnKind::Date),
        Column::new("notification_type", ColumnKind::Enum(&["info", "warning", "error"])),
        Column::new("notification_status", ColumnKind::Enum(&["unread", "read", "deleted"])),
        Column::new("created_at", ColumnKind::DateTime),
    ],
};

#[derive(Clone, Debug)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: &CreateNotificationRequest) -> Result<Notification, SchoolEventsError> {
        let now = Utc::now();
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, notification_content, notification_date, notification_type,
                                       notification_status, send_notification, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'unread', $5, $6, $6)
            RETURNING *
            "#
        )
        .bind(request.user_id)
        .bind(&request.notification_content)
        .bind(now.date_naive())
        .bind(request.notification_type.as_str())
        .bind(request.send_notification)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    /// Non-deleted notifications of one user, newest first unless sorted otherwise
    pub async fn list_for_user(
        &self,
        user_id: i64,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Notification>, SchoolEventsError> {
        fetch_page(&self.pool, &NOTIFICATIONS, filters, page, move |qb| {
            qb.push(" AND notifications.notification_status <> 'deleted' AND notifications.user_id = ");
            qb.push_bind(user_id);
        })
        .await
    }

    /// Change status of a notification owned by `user_id`
    pub async fn set_status(
        &self,
        id: i64,
        user_id: i64,
        status: NotificationStatus,
    ) -> Result<Notification, SchoolEventsError> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET notification_status = $3, updated_at = $4
            WHERE notification_id = $1 AND user_id = $2 AND notification_status <> 'deleted'
            RETURNING *
            "#
        )
        .bind(id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(SchoolEventsError::NotificationNotFound { notification_id: id })
    }

    pub async fn has_unread(&self, user_id: i64) -> Result<bool, SchoolEventsError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE user_id = $1 AND notification_status = 'unread')"
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Drop deleted or read notifications older than `retention_days`
    pub async fn purge_older_than(&self, retention_days: i64) -> Result<u64, SchoolEventsError> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE notification_status IN ('read', 'deleted') AND created_at < $1"
        )
        .bind(Utc::now() - Duration::days(retention_days))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Pending rows, failed rows with retries left (`$2`) and claims abandoned before `$3`
const SENDABLE: &str = "(status = 'pending' \
    OR (status = 'failed' AND retry_count < $2) \
    OR (status = 'sending' AND updated_at < $3))";

#[derive(Clone, Debug)]
pub struct EmailLogRepository {
    pool: PgPool,
}

impl EmailLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a pending outbox row
    pub async fn create(&self, conn: &mut PgConnection, email: &NewEmailLog) -> Result<EmailLog, SchoolEventsError> {
        let now = Utc::now();
        let log = sqlx::query_as::<_, EmailLog>(
            r#"
            INSERT INTO email_logs (user_id, recipient_email, subject, email_data, email_template, status, language,
                                    email_type, retry_count, priority, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $5, 0, $7, $8, $8)
            RETURNING *
            "#
        )
        .bind(email.user_id)
        .bind(&email.recipient_email)
        .bind(&email.subject)
        .bind(&email.email_data)
        .bind(email.template.as_str())
        .bind(email.language.as_str())
        .bind(email.priority)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(log)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<EmailLog>, SchoolEventsError> {
        let log = sqlx::query_as::<_, EmailLog>("SELECT * FROM email_logs WHERE email_log_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(log)
    }

    /// Take a single row for delivery; `None` when it is sent, exhausted or held by another worker
    pub async fn claim(&self, id: i64, max_retries: i32, stale_after: Duration) -> Result<Option<EmailLog>, SchoolEventsError> {
        let now = Utc::now();
        let log = sqlx::query_as::<_, EmailLog>(&format!(
            r#"
            UPDATE email_logs SET status = 'sending', updated_at = $4
            WHERE email_log_id = $1 AND {}
            RETURNING *
            "#,
            SENDABLE
        ))
        .bind(id)
        .bind(max_retries)
        .bind(now - stale_after)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    /// Take up to `limit` sendable rows, by priority then age; rows locked elsewhere are skipped
    pub async fn claim_batch(
        &self,
        limit: i64,
        max_retries: i32,
        stale_after: Duration,
    ) -> Result<Vec<EmailLog>, SchoolEventsError> {
        let now = Utc::now();
        let mut logs = sqlx::query_as::<_, EmailLog>(&format!(
            r#"
            UPDATE email_logs SET status = 'sending', updated_at = $4
            WHERE email_log_id IN (
                SELECT email_log_id FROM email_logs
                WHERE {}
                ORDER BY priority ASC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
            SENDABLE
        ))
        .bind(limit)
        .bind(max_retries)
        .bind(now - stale_after)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        logs.sort_by_key(|log| (log.priority, log.created_at));
        Ok(logs)
    }

    pub async fn mark_success(&self, id: i64, response: Option<&str>) -> Result<(), SchoolEventsError> {
        self.finish(id, EmailStatus::Success, response, false).await
    }

    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<(), SchoolEventsError> {
        self.finish(id, EmailStatus::Failed, Some(error), true).await
    }

    async fn finish(
        &self,
        id: i64,
        status: EmailStatus,
        response: Option<&str>,
        count_retry: bool,
    ) -> Result<(), SchoolEventsError> {
        sqlx::query(
            r#"
            UPDATE email_logs
            SET status = $2, response = $3, retry_count = retry_count + CASE WHEN $4 THEN 1 ELSE 0 END, updated_at = $5
            WHERE email_log_id = $1
            "#
        )
        .bind(id)
        .bind(status.as_str())
        .bind(response)
        .bind(count_retry)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Drop delivered outbox rows older than `retention_days`
    pub async fn purge_sent_older_than(&self, retention_days: i64) -> Result<u64, SchoolEventsError> {
        let result = sqlx::query("DELETE FROM email_logs WHERE status = 'success' AND updated_at < $1")
            .bind(Utc::now() - Duration::days(retention_days))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>, SchoolEventsError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM email_logs GROUP BY status ORDER BY status")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notification_repository_creation() {
        let pool = PgPool::connect("postgresql://test").await;
        if let Ok(pool) = pool {
            let repo = NotificationRepository::new(pool.clone());
            assert!(!repo.pool.is_closed());
            let outbox = EmailLogRepository::new(pool);
            assert!(!outbox.pool.is_closed());
        }
    }

    #[test]
    fn test_user_id_is_not_a_filter_column() {
        // ownership comes from the token, never from filter_params
        assert!(NOTIFICATIONS.column("user_id").is_none());
    }
}
