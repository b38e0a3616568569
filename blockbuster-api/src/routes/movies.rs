/// Movie endpoints
///
/// - `POST /movies` - Create movie (201)
/// - `GET /movies` - List movies, newest first; `?q=` keeps those whose name
///   or director contains the text, ignoring case
/// - `GET /movies/:id` - Get movie
/// - `PUT /movies/:id` - Replace movie fields
/// - `DELETE /movies/:id` - Delete movie (204; 409 while loans reference it)
///
/// # Request body
///
/// ```json
/// {
///   "name": "Inception",
///   "director": "Christopher Nolan",
///   "year": 2010,
///   "quantity": 3,
///   "cover_url": "https://img.example/inception.jpg"
/// }
/// ```

use super::{parse_id, JsonBody, SearchParams};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use blockbuster_shared::models::movie::{CreateMovie, Movie, UpdateMovie};

pub async fn create_movie(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateMovie>,
) -> ApiResult<(StatusCode, Json<Movie>)> {
    let movie = state.services.movies.create_movie(req).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(state.services.movies.search_movies(params.query()).await?))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Movie>> {
    let id = parse_id(&id, "movie id")?;
    Ok(Json(state.services.movies.get_movie(id).await?))
}

pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateMovie>,
) -> ApiResult<Json<Movie>> {
    let id = parse_id(&id, "movie id")?;
    Ok(Json(state.services.movies.update_movie(id, req).await?))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "movie id")?;
    state.services.movies.delete_movie(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
