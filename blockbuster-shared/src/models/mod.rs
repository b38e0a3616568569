/// Domain records and validated inputs
///
/// - `movie`: rentable titles and their stock
/// - `user`: customers who borrow movies
/// - `loan`: a movie borrowed by a user, with its lifecycle status
///
/// Inputs derive `validator::Validate` for the declarative rules and add the
/// checks a derive cannot express (trimmed blanks, the current year). Both
/// kinds of failure come back as one list of [`FieldViolation`]s.

pub mod loan;
pub mod movie;
pub mod user;

use crate::error::{FieldViolation, ServiceError};
use validator::ValidationErrors;

/// Flattens `validator` output into field violations, sorted by field name
pub(crate) fn field_violations(errors: &ValidationErrors) -> Vec<FieldViolation> {
    let mut violations: Vec<FieldViolation> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                FieldViolation::new(
                    field.to_string(),
                    error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                )
            })
        })
        .collect();

    violations.sort_by(|a, b| a.field.cmp(&b.field));
    violations
}

/// Records a violation when `value` is empty after trimming
pub(crate) fn require_non_blank(
    violations: &mut Vec<FieldViolation>,
    field: &str,
    value: &str,
    message: &str,
) {
    if value.trim().is_empty() && !violations.iter().any(|v| v.field == field) {
        violations.push(FieldViolation::new(field, message));
    }
}

/// Turns collected violations into a result
pub(crate) fn into_result(violations: Vec<FieldViolation>) -> Result<(), ServiceError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(violations))
    }
}
