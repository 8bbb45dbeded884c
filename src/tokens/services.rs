use std::{sync::Arc, time::Duration as StdDuration};

use axum::extract::FromRef;
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::{
    error::AppError,
    state::AppState,
    tokens::{
        repo::TokenStore,
        repo_types::{hash_plaintext, IssuedToken, Scope, PLAINTEXT_LEN},
    },
    users::{User, UserStore},
};

/// Issues and resolves activation and authentication tokens.
#[derive(Clone)]
pub struct TokenService {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.tokens.clone(), state.users.clone())
    }
}

impl TokenService {
    pub fn new(tokens: Arc<dyn TokenStore>, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        user_id: i64,
        scope: Scope,
        ttl: Duration,
    ) -> Result<IssuedToken, AppError> {
        let token = IssuedToken::generate(user_id, scope, ttl)?;
        self.tokens.insert(token.record()).await?;
        debug!(user_id, %scope, expiry = %token.expiry(), "token issued");
        Ok(token)
    }

    /// Resolve a live token to its owner and delete it. Works once per token.
    #[instrument(skip(self, plaintext))]
    pub async fn consume(&self, plaintext: &str, scope: Scope) -> Result<User, AppError> {
        if plaintext.len() != PLAINTEXT_LEN {
            return Err(AppError::InvalidOrExpiredToken);
        }
        let hash = hash_plaintext(plaintext);
        let Some(user_id) = self
            .tokens
            .take(&hash, scope, OffsetDateTime::now_utc())
            .await?
        else {
            return Err(AppError::InvalidOrExpiredToken);
        };
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)?;
        debug!(user_id, %scope, "token consumed");
        Ok(user)
    }

    /// Like [`consume`](Self::consume) but leaves the token in place.
    #[instrument(skip(self, plaintext))]
    pub async fn validate(&self, plaintext: &str, scope: Scope) -> Result<User, AppError> {
        if plaintext.len() != PLAINTEXT_LEN {
            return Err(AppError::InvalidOrExpiredToken);
        }
        let hash = hash_plaintext(plaintext);
        self.tokens
            .find_user(&hash, scope, OffsetDateTime::now_utc())
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)
    }

    #[instrument(skip(self))]
    pub async fn revoke_all_for_scope(&self, user_id: i64, scope: Scope) -> Result<u64, AppError> {
        let removed = self.tokens.delete_all_for_user(user_id, scope).await?;
        debug!(user_id, %scope, removed, "tokens revoked");
        Ok(removed)
    }

    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        Ok(self.tokens.delete_expired(OffsetDateTime::now_utc()).await?)
    }

    /// Periodically drop expired rows. Lookups already ignore them.
    pub fn spawn_purger(self, every: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "purged expired tokens"),
                    Err(e) => error!(error = ?e, "token purge failed"),
                }
            }
        })
    }
}
