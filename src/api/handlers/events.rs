use axum::extract::State;
use serde_json::Value;

use crate::api::error::{ApiJson, ApiPath, ApiQuery};
use crate::api::extract::{CurrentUser, ListParams, MaybeUser};
use crate::api::response::{ApiResult, Download, GenericResponse};
use crate::api::state::AppState;
use crate::database::filters::Pagination;
use crate::database::repositories::event::{EVENTS, EVENT_CLAIMS};
use crate::models::{
    CreateClaimRequest, CreateEventRequest, Event, EventClaim, EventDate, EventSearchParams, EventWithDates,
    SetLockTimeRequest, UpdateClaimStatusRequest, UpdateEventRequest,
};
use crate::services::Permission;
use crate::utils::errors::Result;

/// Only staff may list unpublished events
fn scoped_search(user: Option<&CurrentUser>, mut search: EventSearchParams) -> EventSearchParams {
    let staff = user.is_some_and(|u| u.ctx.has(Permission::ManageEvents) || u.ctx.has(Permission::ManageOwnEvents));
    if !staff {
        search.admin = Some(false);
    }
    search
}

fn unread(user: &Option<CurrentUser>) -> bool {
    user.as_ref().is_some_and(|u| u.unread_notification)
}

pub async fn create_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateEventRequest>,
) -> ApiResult<EventWithDates> {
    let event = state.services.event_service.create_event(&user.ctx, request).await?;
    Ok(GenericResponse::created("Event created successfully", event).with_unread(user.unread_notification))
}

pub async fn list_events(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(search): ApiQuery<EventSearchParams>,
) -> ApiResult<Pagination<Event>> {
    let (filters, page) = params.parse(&EVENTS)?;
    let search = scoped_search(user.as_ref(), search);
    let events = state.services.event_service.list_events(&filters, &search, page).await?;
    Ok(GenericResponse::ok("All events retrieved successfully", events).with_unread(unread(&user)))
}

pub async fn list_events_with_dates(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(search): ApiQuery<EventSearchParams>,
) -> ApiResult<Pagination<EventWithDates>> {
    let (filters, page) = params.parse(&EVENTS)?;
    let search = scoped_search(user.as_ref(), search);
    let events = state.services.event_service.list_events_with_dates(&filters, &search, page).await?;
    Ok(GenericResponse::ok("All events retrieved successfully", events).with_unread(unread(&user)))
}

pub async fn get_event(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiPath(event_id): ApiPath<i64>,
) -> ApiResult<EventWithDates> {
    let event = state.services.event_service.get_event_with_dates(event_id).await?;
    Ok(GenericResponse::ok("Event retrieved successfully", event).with_unread(unread(&user)))
}

pub async fn update_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateEventRequest>,
) -> ApiResult<EventWithDates> {
    let event = state.services.event_service.update_event(&user.ctx, event_id, request).await?;
    Ok(GenericResponse::ok("Event updated successfully", event).with_unread(user.unread_notification))
}

pub async fn delete_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<i64>,
) -> ApiResult<Event> {
    let event = state.services.event_service.delete_event(&user.ctx, event_id).await?;
    Ok(GenericResponse::ok("Event deleted successfully", event).with_unread(user.unread_notification))
}

pub async fn list_by_organizer(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(organizer_id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<Event>> {
    let (filters, page) = params.parse(&EVENTS)?;
    let events = state.services.event_service.list_by_organizer(organizer_id, &filters, page).await?;
    Ok(GenericResponse::ok("Organizer events retrieved successfully", events).with_unread(user.unread_notification))
}

pub async fn get_event_date(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiPath(event_date_id): ApiPath<i64>,
) -> ApiResult<EventDate> {
    let date = state.services.event_service.get_event_date(event_date_id).await?;
    Ok(GenericResponse::ok("Event date retrieved successfully", date).with_unread(unread(&user)))
}

pub async fn set_lock_time(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<SetLockTimeRequest>,
) -> ApiResult<EventDate> {
    let date = state.services.event_service.set_lock_time(&user.ctx, request).await?;
    Ok(GenericResponse::ok("Lock time updated successfully", date).with_unread(user.unread_notification))
}

pub async fn mark_as_paid(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_date_id): ApiPath<i64>,
) -> ApiResult<EventDate> {
    let date = state.services.event_service.mark_as_paid(&user.ctx, event_date_id).await?;
    Ok(GenericResponse::ok("Event date marked as paid", date).with_unread(user.unread_notification))
}

pub async fn mark_as_completed(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_date_id): ApiPath<i64>,
) -> ApiResult<EventDate> {
    let date = state.services.event_service.mark_as_completed(&user.ctx, event_date_id).await?;
    Ok(GenericResponse::ok("Event date marked as completed", date).with_unread(user.unread_notification))
}

pub async fn submit_claim(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateClaimRequest>,
) -> ApiResult<EventClaim> {
    let claim = state.services.event_service.submit_claim(&user.ctx, request).await?;
    Ok(GenericResponse::created("Claim submitted successfully", claim).with_unread(user.unread_notification))
}

pub async fn list_pending_claims(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<EventClaim>> {
    user.ctx.require(Permission::ReviewClaims)?;
    let (filters, page) = params.parse(&EVENT_CLAIMS)?;
    let claims = state.services.event_service.list_pending_claims(&filters, page).await?;
    Ok(GenericResponse::ok("Pending claims retrieved successfully", claims).with_unread(user.unread_notification))
}

pub async fn review_claim(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(claim_id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateClaimStatusRequest>,
) -> ApiResult<EventClaim> {
    let claim = state.services.event_service.review_claim(&user.ctx, claim_id, request).await?;
    Ok(GenericResponse::ok("Claim updated successfully", claim).with_unread(user.unread_notification))
}

/// Rows sent by the frontend table as a CSV download
pub async fn export_events(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiJson(rows): ApiJson<Vec<Value>>,
) -> Result<Download> {
    let csv = state.services.event_service.export_csv(&rows)?;
    Ok(Download {
        filename: "events.csv".to_string(),
        content_type: "text/csv; charset=utf-8",
        body: csv.into_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_search_never_sees_unpublished_events() {
        let search = EventSearchParams { admin: Some(true), ..Default::default() };
        assert_eq!(scoped_search(None, search).admin, Some(false));
    }
}
