/// Loan model
///
/// # State Machine
///
/// ```text
/// active → returned
/// ```
///
/// Loans are created only by the loan workflow and always start `active`.
/// `returned` is terminal. Loans are never deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE loan_status AS ENUM ('active', 'returned');
///
/// CREATE TABLE loans (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     movie_id UUID NOT NULL REFERENCES movies(id) ON DELETE RESTRICT,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     borrowed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     returned_at TIMESTAMPTZ,
///     status loan_status NOT NULL DEFAULT 'active',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX loans_one_active_per_user ON loans (user_id) WHERE status = 'active';
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// The movie is out with the user
    Active,

    /// The movie is back on the shelf
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
        }
    }

    /// Checks if transition to target status is valid
    pub fn can_transition_to(&self, target: LoanStatus) -> bool {
        matches!((self, target), (LoanStatus::Active, LoanStatus::Returned))
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string names no loan status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown loan status: {0}")]
pub struct UnknownLoanStatus(pub String);

impl FromStr for LoanStatus {
    type Err = UnknownLoanStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [LoanStatus::Active, LoanStatus::Returned]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLoanStatus(s.to_string()))
    }
}

/// A movie borrowed by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub borrowed_at: DateTime<Utc>,

    /// Set exactly when `status` is `Returned`
    pub returned_at: Option<DateTime<Utc>>,

    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}
