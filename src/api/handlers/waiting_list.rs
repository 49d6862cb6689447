use axum::extract::State;

use crate::api::error::{ApiJson, ApiPath, ApiQuery};
use crate::api::extract::{CurrentUser, ListParams};
use crate::api::response::{ApiResult, GenericResponse};
use crate::api::state::AppState;
use crate::database::filters::Pagination;
use crate::database::repositories::reservation::WAITING_LIST;
use crate::models::{CreateWaitingListRequest, UpdateWaitingListRequest, WaitingListEntry};
use crate::services::ProcessOutcome;

pub async fn add_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateWaitingListRequest>,
) -> ApiResult<WaitingListEntry> {
    let entry = state.services.waiting_list_service.create_entry(&user.ctx, request).await?;
    Ok(GenericResponse::created("Successfully added to waiting list", entry).with_unread(user.unread_notification))
}

/// Waiting entries of a date in queue order
pub async fn queue_for_date(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_date_id): ApiPath<i64>,
) -> ApiResult<Vec<WaitingListEntry>> {
    let entries = state.services.waiting_list_service.queue_for_date(event_date_id).await?;
    Ok(GenericResponse::ok("Waiting list retrieved successfully", entries).with_unread(user.unread_notification))
}

pub async fn get_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(entry_id): ApiPath<i64>,
) -> ApiResult<WaitingListEntry> {
    let entry = state.services.waiting_list_service.get_entry(&user.ctx, entry_id).await?;
    Ok(GenericResponse::ok("Waiting list entry retrieved successfully", entry).with_unread(user.unread_notification))
}

pub async fn list_by_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<WaitingListEntry>> {
    let (filters, page) = params.parse(&WAITING_LIST)?;
    let entries = state
        .services
        .waiting_list_service
        .list_by_user(&user.ctx, user_id, None, &filters, page)
        .await?;
    Ok(GenericResponse::ok("User waiting list entries retrieved successfully", entries).with_unread(user.unread_notification))
}

pub async fn list_by_date_and_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath((event_date_id, user_id)): ApiPath<(i64, i64)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<WaitingListEntry>> {
    let (filters, page) = params.parse(&WAITING_LIST)?;
    let entries = state
        .services
        .waiting_list_service
        .list_by_user(&user.ctx, user_id, Some(event_date_id), &filters, page)
        .await?;
    Ok(GenericResponse::ok("User waiting list entries retrieved successfully", entries).with_unread(user.unread_notification))
}

pub async fn update_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(entry_id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateWaitingListRequest>,
) -> ApiResult<WaitingListEntry> {
    let entry = state.services.waiting_list_service.update_entry(&user.ctx, entry_id, request).await?;
    Ok(GenericResponse::ok("Waiting list entry updated successfully", entry).with_unread(user.unread_notification))
}

/// Marks the entry cancelled
pub async fn delete_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(entry_id): ApiPath<i64>,
) -> ApiResult<WaitingListEntry> {
    let entry = state.services.waiting_list_service.delete_entry(&user.ctx, entry_id).await?;
    Ok(GenericResponse::ok("Waiting list entry removed successfully", entry).with_unread(user.unread_notification))
}

pub async fn process(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_date_id): ApiPath<i64>,
) -> ApiResult<ProcessOutcome> {
    let outcome = state.services.waiting_list_service.process_for_actor(&user.ctx, event_date_id).await?;
    Ok(GenericResponse::ok("Waiting list processed successfully", outcome).with_unread(user.unread_notification))
}
