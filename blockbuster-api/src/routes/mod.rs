/// API route handlers
///
/// Organized by resource:
///
/// - `health`: liveness and database connectivity
/// - `dashboard`: store-wide totals
/// - `movies`: movie CRUD
/// - `users`: user CRUD
/// - `loans`: check-out, return and loan queries

pub mod dashboard;
pub mod health;
pub mod loans;
pub mod movies;
pub mod users;

use crate::error::ApiError;
use axum::extract::FromRequest;
use serde::Deserialize;
use uuid::Uuid;

/// JSON body extractor whose rejections use the API error format
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `?q=` on list endpoints; absent or blank lists everything
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

impl SearchParams {
    pub fn query(&self) -> &str {
        self.q.as_deref().unwrap_or_default()
    }
}

/// Parses an id taken from the path or a request body
///
/// Runs before any service call so a malformed id never reaches the store.
pub fn parse_id(raw: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("invalid {}: {}", field, raw)))
}
