/// Loan endpoints
///
/// - `POST /loans` - Check a movie out to a user (201)
/// - `GET /loans` - List every loan, newest first; `?status=active|returned`
///   narrows the list
/// - `GET /loans/:id` - Get loan
/// - `GET /loans/users/:user_id` - Active loans of a user
/// - `POST|PUT /loans/:id/return` - Return the movie (200)
///
/// # Create request
///
/// ```json
/// { "movie_id": "uuid", "user_id": "uuid" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: malformed id, body or status filter
/// - `404 Not Found`: movie, user or loan does not exist
/// - `409 Conflict`: movie not available, user already has an active loan,
///   or loan already returned
/// - `422 Unprocessable Entity`: an id is missing

use super::{parse_id, JsonBody};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use blockbuster_shared::{
    error::FieldViolation,
    models::loan::{Loan, LoanStatus, UnknownLoanStatus},
};
use serde::Deserialize;
use uuid::Uuid;

/// Create loan request
///
/// Ids stay strings here so a malformed one is reported as a bad request
/// rather than a body decoding failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateLoanRequest {
    pub movie_id: Option<String>,
    pub user_id: Option<String>,
}

impl CreateLoanRequest {
    fn ids(&self) -> ApiResult<(Uuid, Uuid)> {
        let fields = [("movie_id", &self.movie_id), ("user_id", &self.user_id)];
        let missing: Vec<FieldViolation> = fields
            .into_iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(field, _)| FieldViolation::new(field, "is required"))
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::ValidationError(missing));
        }

        let movie_id = parse_id(self.movie_id.as_deref().unwrap_or_default(), "movie_id")?;
        let user_id = parse_id(self.user_id.as_deref().unwrap_or_default(), "user_id")?;
        Ok((movie_id, user_id))
    }
}

/// `GET /loans` filter
#[derive(Debug, Default, Deserialize)]
pub struct LoanFilter {
    pub status: Option<String>,
}

impl LoanFilter {
    fn status(&self) -> ApiResult<Option<LoanStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e: UnknownLoanStatus| ApiError::BadRequest(e.to_string())),
        }
    }
}

pub async fn create_loan(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateLoanRequest>,
) -> ApiResult<(StatusCode, Json<Loan>)> {
    let (movie_id, user_id) = req.ids()?;
    let loan = state.services.loans.create_loan(movie_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

pub async fn list_loans(
    State(state): State<AppState>,
    Query(filter): Query<LoanFilter>,
) -> ApiResult<Json<Vec<Loan>>> {
    let loans = match filter.status()? {
        Some(status) => state.services.loans.list_loans_by_status(status).await?,
        None => state.services.loans.list_loans().await?,
    };
    Ok(Json(loans))
}

pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Loan>> {
    let id = parse_id(&id, "loan id")?;
    Ok(Json(state.services.loans.get_loan(id).await?))
}

pub async fn get_user_loans(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Loan>>> {
    let user_id = parse_id(&user_id, "user id")?;
    Ok(Json(state.services.loans.get_user_loans(user_id).await?))
}

pub async fn return_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Loan>> {
    let id = parse_id(&id, "loan id")?;
    Ok(Json(state.services.loans.return_movie(id).await?))
}
