//! Request extractors: bearer authentication and list parameters

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use serde::Deserialize;
use tracing::warn;

use crate::api::state::AppState;
use crate::database::filters::{FilterSet, PageRequest, TableSpec};
use crate::services::AuthContext;
use crate::utils::errors::{Result, SchoolEventsError};

/// `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The authenticated, active caller
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub ctx: AuthContext,
    pub unread_notification: bool,
}

impl CurrentUser {
    pub fn user_id(&self) -> i64 {
        self.ctx.user_id()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = SchoolEventsError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers).ok_or_else(SchoolEventsError::invalid_credentials)?;
        let ctx = state.services.auth_service.authenticate(token).await?;

        // the envelope flag must not fail the request
        let unread_notification = match state.services.notification_service.has_unread(ctx.user_id()).await {
            Ok(unread) => unread,
            Err(e) => {
                warn!(user_id = ctx.user_id(), error = %e, "Unread notification check failed");
                false
            }
        };

        Ok(Self { ctx, unread_notification })
    }
}

/// Present when a valid bearer token was sent
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = SchoolEventsError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if bearer_token(&parts.headers).is_none() {
            return Ok(Self(None));
        }
        CurrentUser::from_request_parts(parts, state).await.map(|user| Self(Some(user)))
    }
}

/// `current_page`, `items_per_page`, `filter_params`, `sorting_params`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub current_page: Option<i64>,
    pub items_per_page: Option<i64>,
    pub filter_params: Option<String>,
    pub sorting_params: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> Result<PageRequest> {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.current_page.unwrap_or(defaults.current_page),
            self.items_per_page.unwrap_or(defaults.items_per_page),
        )
    }

    pub fn filters(&self, spec: &TableSpec) -> Result<FilterSet> {
        FilterSet::from_query(spec, self.filter_params.as_deref(), self.sorting_params.as_deref())
    }

    /// Page and filters in one go
    pub fn parse(&self, spec: &TableSpec) -> Result<(FilterSet, PageRequest)> {
        Ok((self.filters(spec)?, self.page()?))
    }
}
