/// User endpoints
///
/// - `POST /users` - Register user (201; 409 on a taken email)
/// - `GET /users` - List users, newest first; `?q=` matches name or email
/// - `GET /users/:id` - Get user
/// - `PUT /users/:id` - Replace user fields
/// - `DELETE /users/:id` - Delete user (204; 409 while loans reference it)

use super::{parse_id, JsonBody, SearchParams};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use blockbuster_shared::models::user::{CreateUser, UpdateUser, User};

pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.services.users.create_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.services.users.search_users(params.query()).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&id, "user id")?;
    Ok(Json(state.services.users.get_user(id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUser>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&id, "user id")?;
    Ok(Json(state.services.users.update_user(id, req).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "user id")?;
    state.services.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
