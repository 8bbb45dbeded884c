use async_trait::async_trait;

use crate::{
    db::{is_unique_violation, PgStore},
    error::StoreError,
    users::repo_types::{NewUser, User},
};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; a taken email yields `StoreError::DuplicateEmail`.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// Write back `user` if its version is still current and return the bumped row.
    /// A stale version yields `StoreError::EditConflict`.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}

const USER_COLUMNS: &str = "id, created_at, name, email, password_hash, activated, version";

#[async_trait]
impl UserStore for PgStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, activated)
            VALUES ($1, $2, $3, FALSE)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateEmail
                } else {
                    StoreError::Database(e)
                }
            })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let query = format!(
            r#"
            UPDATE users
               SET name = $1, email = $2, password_hash = $3, activated = $4,
                   version = version + 1
             WHERE id = $5 AND version = $6
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateEmail
                } else {
                    StoreError::Database(e)
                }
            })?;
        row.ok_or(StoreError::EditConflict)
    }
}
