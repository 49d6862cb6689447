use axum::extract::State;

use crate::api::error::{ApiPath, ApiQuery};
use crate::api::extract::{CurrentUser, ListParams};
use crate::api::response::{ApiResult, GenericResponse};
use crate::api::state::AppState;
use crate::database::filters::Pagination;
use crate::database::repositories::notification::NOTIFICATIONS;
use crate::models::Notification;

pub async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<Notification>> {
    let (filters, page) = params.parse(&NOTIFICATIONS)?;
    let notifications = state
        .services
        .notification_service
        .list_for_user(user.user_id(), &filters, page)
        .await?;
    Ok(GenericResponse::ok("Notifications retrieved successfully", notifications).with_unread(user.unread_notification))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(notification_id): ApiPath<i64>,
) -> ApiResult<Notification> {
    let notifications = &state.services.notification_service;
    let notification = notifications.mark_read(notification_id, user.user_id()).await?;
    let unread = notifications.has_unread(user.user_id()).await?;
    Ok(GenericResponse::ok("Notification marked as read", notification).with_unread(unread))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(notification_id): ApiPath<i64>,
) -> ApiResult<Notification> {
    let notifications = &state.services.notification_service;
    let notification = notifications.delete(notification_id, user.user_id()).await?;
    let unread = notifications.has_unread(user.user_id()).await?;
    Ok(GenericResponse::ok("Notification deleted successfully", notification).with_unread(unread))
}
