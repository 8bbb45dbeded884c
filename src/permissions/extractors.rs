use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::{
    error::AppError,
    permissions::services::Principal,
    state::AppState,
    tokens::{Scope, TokenService},
};

/// No `Authorization` header means `Anonymous`; a header that does not
/// resolve to a live authentication token is rejected with 401.
#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Principal::Anonymous);
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::InvalidAuthenticationToken)?;

        let tokens = TokenService::from_ref(state);
        let user = match tokens.validate(token, Scope::Authentication).await {
            Ok(user) => user,
            Err(AppError::InvalidOrExpiredToken) => {
                warn!("invalid or expired authentication token");
                return Err(AppError::InvalidAuthenticationToken);
            }
            Err(e) => return Err(e),
        };

        let permissions = state.permissions.for_user(user.id).await?;
        Ok(Principal::User { user, permissions })
    }
}
