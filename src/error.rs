use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Field name -> human readable message, rendered as `{"error": {...}}`.
pub type FieldErrors = BTreeMap<String, String>;

/// Failures raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("edit conflict")]
    EditConflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("failed validation")]
    Validation(FieldErrors),
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("invalid authentication token")]
    InvalidAuthenticationToken,
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("inactive account")]
    InactiveAccount,
    #[error("permission denied")]
    PermissionDenied,
    #[error("edit conflict")]
    EditConflict,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn field(key: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(key.to_string(), message.to_string());
        Self::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) | Self::DuplicateEmail | Self::InvalidOrExpiredToken => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::InvalidCredentials
            | Self::InvalidAuthenticationToken
            | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::InactiveAccount | Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            Self::BadRequest(message) => json!(message),
            Self::Validation(errors) => json!(errors),
            Self::DuplicateEmail => {
                json!({ "email": "a user with this email address already exists" })
            }
            Self::InvalidCredentials => json!("invalid authentication credentials"),
            Self::InvalidOrExpiredToken => json!({ "token": "invalid or expired activation token" }),
            Self::InvalidAuthenticationToken => json!("invalid or missing authentication token"),
            Self::AuthenticationRequired => json!("you must be authenticated to access this resource"),
            Self::InactiveAccount => {
                json!("your user account must be activated to access this resource")
            }
            Self::PermissionDenied => json!(
                "your user account doesn't have the necessary permissions to access this resource"
            ),
            Self::EditConflict => {
                json!("unable to update the record due to an edit conflict, please try again")
            }
            Self::NotFound => json!("the requested resource could not be found"),
            Self::Internal(_) => {
                json!("the server encountered a problem and could not process your request")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::DuplicateEmail,
            StoreError::EditConflict => Self::EditConflict,
            StoreError::NotFound => Self::NotFound,
            StoreError::Database(e) => Self::Internal(anyhow::Error::new(e).context("database")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!(error = ?e, "internal error");
        }
        let status = self.status();
        let mut res = (status, Json(json!({ "error": self.body() }))).into_response();
        if matches!(self, Self::InvalidAuthenticationToken) {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_become_internal() {
        let err: AppError = StoreError::Database(sqlx::Error::RowNotFound).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.body(),
            json!("the server encountered a problem and could not process your request")
        );
    }

    #[test]
    fn duplicate_email_is_field_keyed() {
        let err: AppError = StoreError::DuplicateEmail.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.body()["email"],
            "a user with this email address already exists"
        );
    }

    #[test]
    fn invalid_bearer_sets_www_authenticate() {
        let res = AppError::InvalidAuthenticationToken.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn field_helper_builds_single_entry() {
        let AppError::Validation(errors) = AppError::field("token", "must be provided") else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["token"], "must be provided");
    }
}
