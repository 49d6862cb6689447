//! In-app notification service
//!
//! Short messages shown in the web client. Existence of unread ones is
//! reported on every authenticated response as `unread_notification`.

use tracing::debug;

use crate::database::filters::{FilterSet, PageRequest, Pagination};
use crate::database::NotificationRepository;
use crate::models::{CreateNotificationRequest, Notification, NotificationStatus, NotificationType};
use crate::utils::errors::Result;

#[derive(Clone, Debug)]
pub struct NotificationService {
    notifications: NotificationRepository,
}

impl NotificationService {
    pub fn new(notifications: NotificationRepository) -> Self {
        Self { notifications }
    }

    pub async fn create(&self, request: &CreateNotificationRequest) -> Result<Notification> {
        let notification = self.notifications.create(request).await?;
        debug!(
            notification_id = notification.notification_id,
            user_id = notification.user_id,
            "Notification created"
        );
        Ok(notification)
    }

    /// Informational message for a user
    pub async fn info(&self, user_id: i64, content: impl Into<String>) -> Result<Notification> {
        self.create(&CreateNotificationRequest {
            user_id,
            notification_content: content.into(),
            notification_type: NotificationType::Info,
            send_notification: false,
        })
        .await
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Notification>> {
        self.notifications.list_for_user(user_id, filters, page).await
    }

    pub async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<Notification> {
        self.notifications.set_status(notification_id, user_id, NotificationStatus::Read).await
    }

    /// Soft delete
    pub async fn delete(&self, notification_id: i64, user_id: i64) -> Result<Notification> {
        self.notifications.set_status(notification_id, user_id, NotificationStatus::Deleted).await
    }

    pub async fn has_unread(&self, user_id: i64) -> Result<bool> {
        self.notifications.has_unread(user_id).await
    }
}
