use axum::extract::State;

use crate::api::error::ApiQuery;
use crate::api::extract::{CurrentUser, ListParams};
use crate::api::response::{ApiResult, GenericResponse};
use crate::api::state::AppState;
use crate::database::filters::Pagination;
use crate::database::repositories::report::AUDIT_LOGS;
use crate::models::{AuditLog, ChangelogQuery};
use crate::services::{ChangelogEntry, Permission};

pub async fn list_logs(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<AuditLog>> {
    user.ctx.require(Permission::ViewAuditLog)?;
    let (filters, page) = params.parse(&AUDIT_LOGS)?;
    let logs = state.services.audit_log_service.list(&filters, page).await?;
    Ok(GenericResponse::ok("Logs retrieved successfully", logs).with_unread(user.unread_notification))
}

/// History of one table or record with the changed keys of every step
pub async fn changelog(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ChangelogQuery>,
) -> ApiResult<Vec<ChangelogEntry>> {
    user.ctx.require(Permission::ViewAuditLog)?;
    let entries = state.services.audit_log_service.changelog(&query).await?;
    Ok(GenericResponse::ok("Changelog retrieved successfully", entries).with_unread(user.unread_notification))
}
