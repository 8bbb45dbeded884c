use async_trait::async_trait;

use crate::{
    db::PgStore,
    error::StoreError,
    movies::repo_types::{Movie, NewMovie},
};

#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn insert(&self, movie: NewMovie) -> Result<Movie, StoreError>;
    async fn get(&self, id: i64) -> Result<Option<Movie>, StoreError>;
    /// Version-checked write; a stale version yields `StoreError::EditConflict`.
    async fn update(&self, movie: &Movie) -> Result<Movie, StoreError>;
    /// Missing rows yield `StoreError::NotFound`.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, StoreError>;
}

const MOVIE_COLUMNS: &str = "id, created_at, title, year, runtime, genres, version";

#[async_trait]
impl MovieStore for PgStore {
    async fn insert(&self, movie: NewMovie) -> Result<Movie, StoreError> {
        let query = format!(
            r#"
            INSERT INTO movies (title, year, runtime, genres)
            VALUES ($1, $2, $3, $4)
            RETURNING {MOVIE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Movie>(&query)
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime)
            .bind(&movie.genres)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get(&self, id: i64) -> Result<Option<Movie>, StoreError> {
        let query = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1");
        let row = sqlx::query_as::<_, Movie>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update(&self, movie: &Movie) -> Result<Movie, StoreError> {
        let query = format!(
            r#"
            UPDATE movies
               SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
             WHERE id = $5 AND version = $6
            RETURNING {MOVIE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Movie>(&query)
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime)
            .bind(&movie.genres)
            .bind(movie.id)
            .bind(movie.version)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::EditConflict)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, StoreError> {
        let query = format!(
            r#"
            SELECT {MOVIE_COLUMNS}
              FROM movies
             ORDER BY id ASC
             LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query_as::<_, Movie>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
