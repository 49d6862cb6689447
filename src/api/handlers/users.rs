use axum::extract::State;

use crate::api::error::{ApiJson, ApiPath, ApiQuery};
use crate::api::extract::{CurrentUser, ListParams};
use crate::api::response::{ApiResult, GenericResponse};
use crate::api::state::AppState;
use crate::database::filters::Pagination;
use crate::database::repositories::user::USERS;
use crate::models::{CreateUserRequest, RegisterSchoolRepresentativeRequest, UpdateUserRequest, User};
use crate::services::Permission;

pub async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<User> {
    let created = state.services.user_service.create_user(&user.ctx, request).await?;
    // the acting admin just received a notification
    Ok(GenericResponse::created("User created successfully", created).with_unread(true))
}

pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<User>> {
    user.ctx.require(Permission::ManageUsers)?;
    let (filters, page) = params.parse(&USERS)?;
    let users = state.services.user_service.list_users(&filters, page).await?;
    Ok(GenericResponse::ok("All users retrieved successfully", users).with_unread(user.unread_notification))
}

pub async fn me(user: CurrentUser) -> ApiResult<User> {
    Ok(GenericResponse::ok("User retrieved successfully", user.ctx.user.clone()).with_unread(user.unread_notification))
}

pub async fn list_pending(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<User>> {
    user.ctx.require(Permission::ManageUsers)?;
    let (filters, page) = params.parse(&USERS)?;
    let users = state.services.user_service.list_pending(&filters, page).await?;
    Ok(GenericResponse::ok("Pending users retrieved successfully", users).with_unread(user.unread_notification))
}

/// Public self-registration
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterSchoolRepresentativeRequest>,
) -> ApiResult<User> {
    let user = state.services.user_service.register_school_representative(request).await?;
    Ok(GenericResponse::created("User created successfully", user))
}

pub async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<User> {
    user.ctx.require_self_or_admin(user_id)?;
    let found = state.services.user_service.get_user(user_id).await?;
    Ok(GenericResponse::ok("User retrieved successfully", found).with_unread(user.unread_notification))
}

pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<User> {
    let updated = state.services.user_service.update_user(&user.ctx, user_id, request).await?;
    Ok(GenericResponse::ok("User updated successfully", updated).with_unread(user.unread_notification))
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<User> {
    let deleted = state.services.user_service.delete_user(&user.ctx, user_id).await?;
    Ok(GenericResponse::ok("User deleted successfully", deleted).with_unread(user.unread_notification))
}

pub async fn approve_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<User> {
    let approved = state.services.user_service.approve_user(&user.ctx, user_id).await?;
    Ok(GenericResponse::ok("User approved successfully", approved).with_unread(user.unread_notification))
}

pub async fn reject_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<User> {
    let rejected = state.services.user_service.reject_user(&user.ctx, user_id).await?;
    Ok(GenericResponse::ok("User rejected successfully", rejected).with_unread(user.unread_notification))
}
