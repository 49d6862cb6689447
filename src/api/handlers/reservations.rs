use axum::extract::State;

use crate::api::error::{ApiJson, ApiPath, ApiQuery};
use crate::api::extract::{CurrentUser, ListParams};
use crate::api::response::{ApiResult, GenericResponse};
use crate::api::state::AppState;
use crate::database::filters::Pagination;
use crate::database::repositories::reservation::RESERVATIONS;
use crate::models::{CreateReservationRequest, Reservation, UpdateReservationRequest};

pub async fn create_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateReservationRequest>,
) -> ApiResult<Reservation> {
    let reservation = state.services.reservation_service.create_reservation(&user.ctx, request).await?;
    Ok(GenericResponse::created("Reservation created successfully", reservation).with_unread(user.unread_notification))
}

pub async fn list_reservations(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<Reservation>> {
    let (filters, page) = params.parse(&RESERVATIONS)?;
    let reservations = state
        .services
        .reservation_service
        .list_reservations(&user.ctx, &filters, page)
        .await?;
    Ok(GenericResponse::ok("All reservations retrieved successfully", reservations).with_unread(user.unread_notification))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(reservation_id): ApiPath<i64>,
) -> ApiResult<Reservation> {
    let reservation = state.services.reservation_service.get_reservation(&user.ctx, reservation_id).await?;
    Ok(GenericResponse::ok("Reservation retrieved successfully", reservation).with_unread(user.unread_notification))
}

pub async fn get_by_code(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(code): ApiPath<String>,
) -> ApiResult<Reservation> {
    let reservation = state.services.reservation_service.get_by_code(&user.ctx, &code).await?;
    Ok(GenericResponse::ok("Reservation retrieved successfully", reservation).with_unread(user.unread_notification))
}

pub async fn list_by_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<Reservation>> {
    let (filters, page) = params.parse(&RESERVATIONS)?;
    let reservations = state
        .services
        .reservation_service
        .list_by_event(&user.ctx, event_id, &filters, page)
        .await?;
    Ok(GenericResponse::ok("Reservations retrieved successfully", reservations).with_unread(user.unread_notification))
}

pub async fn list_by_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<Reservation>> {
    let (filters, page) = params.parse(&RESERVATIONS)?;
    let reservations = state
        .services
        .reservation_service
        .list_by_user(&user.ctx, user_id, None, &filters, page)
        .await?;
    Ok(GenericResponse::ok("User reservations retrieved successfully", reservations).with_unread(user.unread_notification))
}

pub async fn list_by_user_and_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath((user_id, event_id)): ApiPath<(i64, i64)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<Reservation>> {
    let (filters, page) = params.parse(&RESERVATIONS)?;
    let reservations = state
        .services
        .reservation_service
        .list_by_user(&user.ctx, user_id, Some(event_id), &filters, page)
        .await?;
    Ok(GenericResponse::ok("User reservations retrieved successfully", reservations).with_unread(user.unread_notification))
}

pub async fn update_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(reservation_id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateReservationRequest>,
) -> ApiResult<Reservation> {
    let reservation = state
        .services
        .reservation_service
        .update_reservation(&user.ctx, reservation_id, request)
        .await?;
    Ok(GenericResponse::ok("Reservation updated successfully", reservation).with_unread(user.unread_notification))
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(reservation_id): ApiPath<i64>,
) -> ApiResult<Reservation> {
    let reservation = state.services.reservation_service.delete_reservation(&user.ctx, reservation_id).await?;
    Ok(GenericResponse::ok("Reservation deleted successfully", reservation).with_unread(user.unread_notification))
}

pub async fn confirm_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(reservation_id): ApiPath<i64>,
) -> ApiResult<Reservation> {
    let reservation = state.services.reservation_service.confirm_reservation(&user.ctx, reservation_id).await?;
    Ok(GenericResponse::ok("Reservation confirmed successfully", reservation).with_unread(user.unread_notification))
}

pub async fn reject_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(reservation_id): ApiPath<i64>,
) -> ApiResult<Reservation> {
    let reservation = state.services.reservation_service.reject_reservation(&user.ctx, reservation_id).await?;
    Ok(GenericResponse::ok("Reservation rejected successfully", reservation).with_unread(user.unread_notification))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(reservation_id): ApiPath<i64>,
) -> ApiResult<Reservation> {
    let reservation = state.services.reservation_service.cancel_reservation(&user.ctx, reservation_id).await?;
    Ok(GenericResponse::ok("Reservation cancelled successfully", reservation).with_unread(user.unread_notification))
}
