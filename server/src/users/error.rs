//! User Record Error Types

use std::fmt;

use thiserror::Error;

use super::password::HashError;
use super::types::UserType;

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// Required field absent or blank.
    #[error("{field} is required")]
    MissingField { field: String },

    /// Format or length violation.
    #[error("{field} {reason}")]
    Validation { field: String, reason: String },

    /// Numeric value outside its inclusive bounds.
    #[error("{field} must be between {min} and {max}")]
    Range { field: String, min: f64, max: f64 },

    /// Value is not one of the enumerated options.
    #[error("{field} must be one of: {}", .allowed.join(", "))]
    InvalidEnum { field: String, allowed: Vec<String> },
}

impl FieldError {
    /// Leaf field name the error refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field }
            | Self::Validation { field, .. }
            | Self::Range { field, .. }
            | Self::InvalidEnum { field, .. } => field,
        }
    }
}

/// A field error and where it was found (`learnerProfile.progress[0].progressPercentage`).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub path: String,
    pub error: FieldError,
}

/// Every field problem found in one candidate record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    issues: Vec<FieldIssue>,
}

impl ValidationReport {
    pub fn single(path: impl Into<String>, error: FieldError) -> Self {
        let mut report = Self::default();
        report.push(path, error);
        report
    }

    pub fn push(&mut self, path: impl Into<String>, error: FieldError) {
        self.issues.push(FieldIssue {
            path: path.into(),
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Error recorded at `path`, if any.
    pub fn get(&self, path: &str) -> Option<&FieldError> {
        self.issues
            .iter()
            .find(|issue| issue.path == path)
            .map(|issue| &issue.error)
    }

    pub(crate) fn sort(&mut self) {
        self.issues.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", issue.path, issue.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Errors surfaced by user record writes and lookups.
#[derive(Debug, Error)]
pub enum UserError {
    /// One or more fields failed validation.
    #[error("Validation failed: {0}")]
    Invalid(ValidationReport),

    /// Unique constraint violated by the storage layer.
    #[error("Duplicate value for unique field {field}")]
    DuplicateKey { field: &'static str },

    /// Password hashing failed; nothing was written.
    #[error("Password processing failed")]
    Hashing(#[from] HashError),

    /// No record with the requested key.
    #[error("User not found")]
    NotFound,

    /// Unknown email or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account inactive or suspended.
    #[error("Account is disabled")]
    AccountDisabled,

    /// Operation targets a profile block this record does not have.
    #[error("Operation requires a {expected} account")]
    WrongRole { expected: UserType },

    /// Database error.
    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl From<ValidationReport> for UserError {
    fn from(report: ValidationReport) -> Self {
        Self::Invalid(report)
    }
}

/// Result type for user operations.
pub type UserResult<T> = Result<T, UserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_enum_message_lists_options() {
        let err = FieldError::InvalidEnum {
            field: "userType".into(),
            allowed: vec!["learner".into(), "instructor".into(), "admin".into()],
        };
        assert_eq!(
            err.to_string(),
            "userType must be one of: learner, instructor, admin"
        );
        assert_eq!(err.field(), "userType");
    }

    #[test]
    fn test_report_display_and_lookup() {
        let mut report = ValidationReport::default();
        report.push(
            "lastName",
            FieldError::MissingField {
                field: "lastName".into(),
            },
        );
        report.push(
            "email",
            FieldError::Validation {
                field: "email".into(),
                reason: "is not a valid email address".into(),
            },
        );
        report.sort();

        assert_eq!(report.len(), 2);
        assert_eq!(
            report.to_string(),
            "email: email is not a valid email address; lastName: lastName is required"
        );
        assert!(matches!(
            report.get("lastName"),
            Some(FieldError::MissingField { .. })
        ));
        assert!(report.get("firstName").is_none());
    }
}
