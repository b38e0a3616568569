/// Movie model
///
/// # Schema
///
/// ```sql
/// CREATE TABLE movies (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     director VARCHAR(255) NOT NULL,
///     year INTEGER NOT NULL,
///     quantity INTEGER NOT NULL DEFAULT 0,
///     cover_url VARCHAR(1024),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT movies_quantity_non_negative CHECK (quantity >= 0),
///     CONSTRAINT movies_quantity_within_limit CHECK (quantity <= 1000000)
/// );
/// ```

use super::{field_violations, into_result, require_non_blank};
use crate::error::{FieldViolation, ServiceError};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Year of the first commercially screened film; earlier years are rejected
pub const FIRST_RELEASE_YEAR: i32 = 1889;

/// Most copies of one title the store will track
pub const MAX_STOCK: i32 = 1_000_000;

/// A rentable title and how many copies are on the shelf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
    pub id: Uuid,
    pub name: String,
    pub director: String,

    /// Release year
    pub year: i32,

    /// Copies available to lend; never negative
    pub quantity: i32,

    /// Optional cover image reference
    pub cover_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    /// Whether at least one copy can be lent
    pub fn is_available(&self) -> bool {
        self.quantity > 0
    }
}

/// Input for creating a movie
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMovie {
    #[validate(length(min = 1, max = 255, message = "movie name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "director name is required"))]
    pub director: String,

    #[validate(range(min = 1889, message = "valid release year is required"))]
    pub year: i32,

    #[validate(range(
        min = 1,
        max = 1000000,
        message = "quantity must be between 1 and 1000000"
    ))]
    pub quantity: i32,

    #[serde(default)]
    #[validate(length(max = 1024, message = "cover url is too long"))]
    pub cover_url: Option<String>,
}

impl CreateMovie {
    /// Runs every field rule, returning all violations at once
    pub fn ensure_valid(&self) -> Result<(), ServiceError> {
        let mut violations = self
            .validate()
            .err()
            .map(|e| field_violations(&e))
            .unwrap_or_default();

        require_non_blank(&mut violations, "name", &self.name, "movie name is required");
        require_non_blank(&mut violations, "director", &self.director, "director name is required");
        check_release_year(&mut violations, self.year);

        into_result(violations)
    }

    /// Copy with surrounding whitespace removed; a blank cover becomes `None`
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            director: self.director.trim().to_string(),
            cover_url: trimmed_cover(self.cover_url.as_deref()),
            ..self.clone()
        }
    }
}

/// Full replacement of a movie's mutable fields
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateMovie {
    #[validate(length(min = 1, max = 255, message = "movie name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "director name is required"))]
    pub director: String,

    #[validate(range(min = 1889, message = "valid release year is required"))]
    pub year: i32,

    #[validate(range(
        min = 0,
        max = 1000000,
        message = "quantity must be between 0 and 1000000"
    ))]
    pub quantity: i32,

    #[serde(default)]
    #[validate(length(max = 1024, message = "cover url is too long"))]
    pub cover_url: Option<String>,
}

impl UpdateMovie {
    pub fn ensure_valid(&self) -> Result<(), ServiceError> {
        let mut violations = self
            .validate()
            .err()
            .map(|e| field_violations(&e))
            .unwrap_or_default();

        require_non_blank(&mut violations, "name", &self.name, "movie name is required");
        require_non_blank(&mut violations, "director", &self.director, "director name is required");
        check_release_year(&mut violations, self.year);

        into_result(violations)
    }

    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            director: self.director.trim().to_string(),
            cover_url: trimmed_cover(self.cover_url.as_deref()),
            ..self.clone()
        }
    }
}

impl From<&Movie> for UpdateMovie {
    fn from(movie: &Movie) -> Self {
        Self {
            name: movie.name.clone(),
            director: movie.director.clone(),
            year: movie.year,
            quantity: movie.quantity,
            cover_url: movie.cover_url.clone(),
        }
    }
}

fn trimmed_cover(cover_url: Option<&str>) -> Option<String> {
    cover_url
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn check_release_year(violations: &mut Vec<FieldViolation>, year: i32) {
    let current_year = Utc::now().year();
    let in_range = (FIRST_RELEASE_YEAR..=current_year).contains(&year);

    if !in_range && !violations.iter().any(|v| v.field == "year") {
        violations.push(FieldViolation::new("year", "valid release year is required"));
    }
}
