use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{tokens::IssuedToken, users::User};

/// Request body for registration. Capitalized keys are accepted too.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Email")]
    pub email: String,
    #[serde(default, alias = "Password")]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    #[serde(default, alias = "Token")]
    pub token: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "Email")]
    pub email: String,
    #[serde(default, alias = "Password")]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendActivationRequest {
    #[serde(default, alias = "Email")]
    pub email: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    pub activated: bool,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            created_at: u.created_at,
            name: u.name,
            email: u.email,
            activated: u.activated,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct TokenBody {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
}

impl From<&IssuedToken> for TokenBody {
    fn from(t: &IssuedToken) -> Self {
        Self {
            token: t.plaintext().to_string(),
            expiry: t.expiry(),
        }
    }
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct AuthTokenResponse {
    pub authentication_token: TokenBody,
}
