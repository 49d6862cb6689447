use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;

use crate::api::error::ApiForm;
use crate::api::extract::bearer_token;
use crate::api::state::AppState;
use crate::services::TokenPair;
use crate::utils::errors::{Result, SchoolEventsError};

/// OAuth2 password form; `username` carries the email
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// `POST /auth/login_user/`
pub async fn login_user(State(state): State<AppState>, ApiForm(form): ApiForm<LoginForm>) -> Result<Json<TokenPair>> {
    let tokens = state.services.auth_service.login(&form.username, &form.password).await?;
    Ok(Json(tokens))
}

/// `POST /auth/refresh_token` with the refresh token as bearer
pub async fn refresh_token(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<TokenPair>> {
    let token = bearer_token(&headers).ok_or_else(SchoolEventsError::invalid_credentials)?;
    let tokens = state.services.auth_service.refresh(token).await?;
    Ok(Json(tokens))
}
