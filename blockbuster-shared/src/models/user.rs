/// User model
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT users_email_unique UNIQUE (email)
/// );
/// ```

use super::{field_violations, into_result, require_non_blank};
use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A customer who can borrow movies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Display name
    pub user_name: String,

    /// Contact email, unique across users
    pub email: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 255, message = "user_name is required"))]
    pub user_name: String,

    #[validate(email(message = "a valid email is required"))]
    pub email: String,
}

impl CreateUser {
    pub fn ensure_valid(&self) -> Result<(), ServiceError> {
        validate_user_fields(self, &self.user_name)
    }

    /// Copy with surrounding whitespace removed
    pub fn normalized(&self) -> Self {
        Self {
            user_name: self.user_name.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

/// Full replacement of a user's mutable fields
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 255, message = "user_name is required"))]
    pub user_name: String,

    #[validate(email(message = "a valid email is required"))]
    pub email: String,
}

impl UpdateUser {
    pub fn ensure_valid(&self) -> Result<(), ServiceError> {
        validate_user_fields(self, &self.user_name)
    }

    pub fn normalized(&self) -> Self {
        Self {
            user_name: self.user_name.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

fn validate_user_fields<T: Validate>(input: &T, user_name: &str) -> Result<(), ServiceError> {
    let mut violations = input
        .validate()
        .err()
        .map(|e| field_violations(&e))
        .unwrap_or_default();

    require_non_blank(&mut violations, "user_name", user_name, "user_name is required");

    into_result(violations)
}
