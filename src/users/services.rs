use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use crate::{
    error::AppError,
    state::AppState,
    users::{
        password::{hash_password_async, verify_dummy, verify_password_async},
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    validation::{normalize_email, validate_email, validate_password, Validator},
};

/// Owns user records and the password check.
#[derive(Clone)]
pub struct Credentials {
    users: Arc<dyn UserStore>,
}

impl FromRef<AppState> for Credentials {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone())
    }
}

impl Credentials {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Validate, hash and store a new unactivated user.
    #[instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let name = name.trim();
        let email = normalize_email(email);

        let mut v = Validator::new();
        v.check(!name.is_empty(), "name", "must be provided");
        v.check(name.len() <= 500, "name", "must not be more than 500 bytes long");
        validate_email(&mut v, &email);
        validate_password(&mut v, password);
        if let Err(e) = v.finish() {
            warn!("create_user rejected by validation");
            return Err(e);
        }

        let password_hash = hash_password_async(password.to_string()).await?;
        let user = self
            .users
            .insert(NewUser {
                name: name.to_string(),
                email,
                password_hash,
            })
            .await
            .map_err(AppError::from)?;

        info!(user_id = user.id, "user created");
        Ok(user)
    }

    /// Resolve `email`/`password` to a user. Every failure looks the same to the caller.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        let Some(user) = self.users.get_by_email(&email).await? else {
            verify_dummy(password.to_string()).await;
            warn!("authenticate unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let ok = verify_password_async(password.to_string(), user.password_hash.clone()).await?;
        if !ok {
            warn!(user_id = user.id, "authenticate wrong password");
            return Err(AppError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get_by_email(&normalize_email(email)).await?)
    }

    pub async fn update(&self, user: &User) -> Result<User, AppError> {
        Ok(self.users.update(user).await?)
    }
}
