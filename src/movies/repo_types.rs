use sqlx::FromRow;
use time::OffsetDateTime;

/// Movie record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Movie {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub title: String,
    pub year: i32,
    pub runtime: i32,           // minutes
    pub genres: Vec<String>,
    pub version: i32,
}

#[derive(Debug, Clone)]
pub struct NewMovie {
    pub title: String,
    pub year: i32,
    pub runtime: i32,
    pub genres: Vec<String>,
}
