use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    db::PgStore,
    error::StoreError,
    tokens::repo_types::{Scope, StoredToken},
    users::User,
};

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &StoredToken) -> Result<(), StoreError>;
    /// Atomically delete a live token and return its owner id.
    async fn take(
        &self,
        hash: &[u8],
        scope: Scope,
        now: OffsetDateTime,
    ) -> Result<Option<i64>, StoreError>;
    /// Read-only lookup of the owner of a live token.
    async fn find_user(
        &self,
        hash: &[u8],
        scope: Scope,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;
    async fn delete_all_for_user(&self, user_id: i64, scope: Scope) -> Result<u64, StoreError>;
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError>;
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, token: &StoredToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (hash, user_id, scope, expiry)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.hash)
        .bind(token.user_id)
        .bind(token.scope.as_str())
        .bind(token.expiry)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take(
        &self,
        hash: &[u8],
        scope: Scope,
        now: OffsetDateTime,
    ) -> Result<Option<i64>, StoreError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            DELETE FROM tokens
             WHERE hash = $1 AND scope = $2 AND expiry > $3
            RETURNING user_id
            "#,
        )
        .bind(hash)
        .bind(scope.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }

    async fn find_user(
        &self,
        hash: &[u8],
        scope: Scope,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT users.id, users.created_at, users.name, users.email,
                   users.password_hash, users.activated, users.version
              FROM users
              INNER JOIN tokens ON users.id = tokens.user_id
             WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > $3
            "#,
        )
        .bind(hash)
        .bind(scope.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_all_for_user(&self, user_id: i64, scope: Scope) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
            .bind(scope.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM tokens WHERE expiry <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
