/// Error types shared by the persistence and service layers
///
/// Repositories return [`StoreError`], which only describes what went wrong in
/// the store. Services turn those into [`ServiceError`], adding the
/// validation and business-rule failures that the API layer maps onto HTTP
/// status codes.
///
/// # Example
///
/// ```
/// use blockbuster_shared::error::{BusinessRuleViolation, ServiceError};
///
/// let err: ServiceError = BusinessRuleViolation::MovieUnavailable.into();
/// assert_eq!(err.to_string(), "movie is not available");
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Names of the database constraints the services know how to interpret
///
/// The in-memory backend reports violations under the same names so both
/// backends surface identical errors.
pub mod constraints {
    /// `CHECK (quantity >= 0)` on movies
    pub const MOVIES_QUANTITY_NON_NEGATIVE: &str = "movies_quantity_non_negative";

    /// `CHECK (quantity <= 1000000)` on movies
    pub const MOVIES_QUANTITY_WITHIN_LIMIT: &str = "movies_quantity_within_limit";

    /// `UNIQUE (email)` on users
    pub const USERS_EMAIL_UNIQUE: &str = "users_email_unique";

    /// Partial unique index on `loans(user_id) WHERE status = 'active'`
    pub const LOANS_ONE_ACTIVE_PER_USER: &str = "loans_one_active_per_user";

    /// Foreign key from loans to movies
    pub const LOANS_MOVIE_ID_FKEY: &str = "loans_movie_id_fkey";

    /// Foreign key from loans to users
    pub const LOANS_USER_ID_FKEY: &str = "loans_user_id_fkey";
}

/// Errors raised by a repository backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// A named constraint rejected the write
    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    /// Any other database failure (connectivity, protocol, decoding)
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Returns the violated constraint name, if any
    pub fn constraint(&self) -> Option<&str> {
        match self {
            StoreError::ConstraintViolation(name) => Some(name.as_str()),
            StoreError::Database(_) => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(constraint) = db_err.constraint() {
                return StoreError::ConstraintViolation(constraint.to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// Kind of entity an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Movie,
    User,
    Loan,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Movie => "movie",
            EntityKind::User => "user",
            EntityKind::Loan => "loan",
        };
        f.write_str(name)
    }
}

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Field that failed validation
    pub field: String,

    /// Human-readable reason
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Domain invariants a request can violate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusinessRuleViolation {
    /// The movie has no copies left to lend
    #[error("movie is not available")]
    MovieUnavailable,

    /// Adding a copy would push the stock past its limit
    #[error("movie stock limit reached")]
    StockLimitReached,

    /// The user already holds an active loan
    #[error("user has an active loan")]
    UserHasActiveLoan,

    /// The loan has already been returned
    #[error("movie already returned")]
    LoanAlreadyReturned,

    /// Another user is registered with the same email
    #[error("email is already registered")]
    EmailTaken,

    /// The entity cannot be deleted while loans reference it
    #[error("{0} is referenced by existing loans")]
    ReferencedByLoans(EntityKind),
}

/// Errors returned by the domain services
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input
    #[error("validation failed: {} invalid field(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    /// The referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: Uuid },

    /// A domain invariant would be broken
    #[error(transparent)]
    BusinessRule(#[from] BusinessRuleViolation),

    /// The store failed; not retried
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

/// Service result type alias
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(entity: EntityKind, id: Uuid) -> Self {
        ServiceError::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }

    /// Returns the business rule behind this error, if any
    pub fn business_rule(&self) -> Option<BusinessRuleViolation> {
        match self {
            ServiceError::BusinessRule(rule) => Some(*rule),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        let rule = match err.constraint() {
            Some(constraints::MOVIES_QUANTITY_NON_NEGATIVE) => {
                Some(BusinessRuleViolation::MovieUnavailable)
            }
            Some(constraints::MOVIES_QUANTITY_WITHIN_LIMIT) => {
                Some(BusinessRuleViolation::StockLimitReached)
            }
            Some(constraints::LOANS_ONE_ACTIVE_PER_USER) => {
                Some(BusinessRuleViolation::UserHasActiveLoan)
            }
            Some(constraints::USERS_EMAIL_UNIQUE) => Some(BusinessRuleViolation::EmailTaken),
            _ => None,
        };

        match rule {
            Some(rule) => ServiceError::BusinessRule(rule),
            None => ServiceError::Storage(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_mapping() {
        let err: ServiceError =
            StoreError::ConstraintViolation(constraints::LOANS_ONE_ACTIVE_PER_USER.into()).into();
        assert_eq!(err.business_rule(), Some(BusinessRuleViolation::UserHasActiveLoan));

        let err: ServiceError =
            StoreError::ConstraintViolation(constraints::MOVIES_QUANTITY_NON_NEGATIVE.into())
                .into();
        assert_eq!(err.business_rule(), Some(BusinessRuleViolation::MovieUnavailable));

        let err: ServiceError =
            StoreError::ConstraintViolation(constraints::MOVIES_QUANTITY_WITHIN_LIMIT.into())
                .into();
        assert_eq!(err.business_rule(), Some(BusinessRuleViolation::StockLimitReached));

        let err: ServiceError = StoreError::ConstraintViolation("something_else".into()).into();
        assert!(matches!(err, ServiceError::Storage(_)));
    }

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        let err = ServiceError::not_found(EntityKind::Loan, id);
        assert_eq!(err.to_string(), format!("loan {} not found", id));
        assert!(err.is_not_found());

        let err = ServiceError::Validation(vec![FieldViolation::new("name", "required")]);
        assert_eq!(err.to_string(), "validation failed: 1 invalid field(s)");

        let err: ServiceError = BusinessRuleViolation::ReferencedByLoans(EntityKind::Movie).into();
        assert_eq!(err.to_string(), "movie is referenced by existing loans");
    }

    #[test]
    fn test_sqlx_row_not_found_is_database_error() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(err.constraint().is_none());
    }
}
