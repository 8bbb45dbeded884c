use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,           // normalized, unique
    pub password_hash: String,   // argon2 PHC string, never leaves the service
    pub activated: bool,
    pub version: i32,            // bumped on every update
}

/// Insert payload; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
