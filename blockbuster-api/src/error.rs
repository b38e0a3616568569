/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`, which converts into a JSON
/// error body with the matching HTTP status code.
///
/// # Status mapping
///
/// | Source                         | Status |
/// |--------------------------------|--------|
/// | malformed id or JSON body      | 400    |
/// | `ServiceError::NotFound`       | 404    |
/// | `ServiceError::BusinessRule`   | 409    |
/// | `ServiceError::Validation`     | 422    |
/// | `ServiceError::Storage`        | 500    |
///
/// # Example
///
/// ```
/// use blockbuster_api::error::ApiError;
/// use blockbuster_shared::error::{BusinessRuleViolation, ServiceError};
/// use axum::{http::StatusCode, response::IntoResponse};
///
/// let err = ApiError::from(ServiceError::from(BusinessRuleViolation::MovieUnavailable));
/// assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use blockbuster_shared::error::{FieldViolation, ServiceError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (409) - a business rule would be broken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<FieldViolation>),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "not_found")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Per-field validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldViolation>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(violations) => ApiError::ValidationError(violations),
            ServiceError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} {} not found", entity, id))
            }
            ServiceError::BusinessRule(rule) => ApiError::Conflict(rule.to_string()),
            ServiceError::Storage(store_err) => ApiError::InternalError(store_err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
