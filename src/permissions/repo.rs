use async_trait::async_trait;

use crate::{db::PgStore, error::StoreError, permissions::services::Permissions};

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn for_user(&self, user_id: i64) -> Result<Permissions, StoreError>;
    /// Grant known permission codes; unknown codes and existing grants are ignored.
    async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError>;
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT permissions.code
              FROM permissions
              INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
             WHERE users_permissions.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Permissions::from(codes))
    }

    async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO users_permissions (user_id, permission_id)
            SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(codes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
