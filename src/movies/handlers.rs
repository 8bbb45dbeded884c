use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{info, instrument};

use crate::{
    error::AppError,
    extractors::{parse_id, JsonBody},
    movies::{
        dto::{CreateMovieRequest, MovieEnvelope, MoviesEnvelope, Pagination, UpdateMovieRequest},
        repo_types::NewMovie,
    },
    permissions::{require_permission, Principal, MOVIES_READ, MOVIES_WRITE},
    state::AppState,
};

pub fn movie_routes() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/:id",
            get(show_movie).patch(update_movie).delete(delete_movie),
        )
}

#[instrument(skip(state, principal))]
pub async fn list_movies(
    State(state): State<AppState>,
    principal: Principal,
    Query(p): Query<Pagination>,
) -> Result<Json<MoviesEnvelope>, AppError> {
    require_permission(&principal, MOVIES_READ)?;
    let limit = p.limit.clamp(1, 100);
    let offset = p.offset.max(0);
    let movies = state.movies.list(limit, offset).await?;
    Ok(Json(MoviesEnvelope {
        movies: movies.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state, principal))]
pub async fn show_movie(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<MovieEnvelope>, AppError> {
    require_permission(&principal, MOVIES_READ)?;
    let id = parse_id(&id)?;
    let movie = state.movies.get(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(MovieEnvelope { movie: movie.into() }))
}

#[instrument(skip(state, principal, body))]
pub async fn create_movie(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<JsonBody<CreateMovieRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_permission(&principal, MOVIES_WRITE)?;
    let JsonBody(body) = body?;
    let movie = state
        .movies
        .insert(NewMovie {
            title: body.title,
            year: body.year,
            runtime: body.runtime.0,
            genres: body.genres,
        })
        .await?;
    info!(movie_id = movie.id, user_id = user.id, "movie created");

    let location = format!("/v1/movies/{}", movie.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(MovieEnvelope { movie: movie.into() }),
    ))
}

#[instrument(skip(state, principal, body))]
pub async fn update_movie(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    body: Result<JsonBody<UpdateMovieRequest>, AppError>,
) -> Result<Json<MovieEnvelope>, AppError> {
    let user = require_permission(&principal, MOVIES_WRITE)?;
    let id = parse_id(&id)?;
    let JsonBody(body) = body?;
    let mut movie = state.movies.get(id).await?.ok_or(AppError::NotFound)?;

    if let Some(title) = body.title {
        movie.title = title;
    }
    if let Some(year) = body.year {
        movie.year = year;
    }
    if let Some(runtime) = body.runtime {
        movie.runtime = runtime.0;
    }
    if let Some(genres) = body.genres {
        movie.genres = genres;
    }

    let movie = state.movies.update(&movie).await?;
    info!(movie_id = movie.id, user_id = user.id, version = movie.version, "movie updated");
    Ok(Json(MovieEnvelope { movie: movie.into() }))
}

#[instrument(skip(state, principal))]
pub async fn delete_movie(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = require_permission(&principal, MOVIES_WRITE)?;
    let id = parse_id(&id)?;
    state.movies.delete(id).await?;
    info!(movie_id = id, user_id = user.id, "movie deleted");
    Ok(Json(json!({ "message": "movie successfully deleted" })))
}
