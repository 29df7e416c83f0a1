//! Error types for the progress engine

use crate::types::{MemberId, RecordId};
use thiserror::Error;

/// Errors that can occur while loading records or resolving a request.
///
/// Missing measurements are never errors; they travel as `None` values.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Failed to parse record payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Progress record has no measurements")]
    EmptyRecord,

    #[error("Invalid value for {field}: {value}")]
    InvalidMeasurement { field: &'static str, value: f64 },

    /// Deliberately carries no member id so the message never confirms
    /// whether the requested member exists.
    #[error("Not authorized to access these progress records")]
    Forbidden,

    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("Progress record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Date parse error: {0}")]
    DateParseError(String),
}

impl ProgressError {
    /// True for errors a caller should present as an authorization failure.
    pub fn is_authorization(&self) -> bool {
        matches!(self, ProgressError::Forbidden)
    }

    /// True for lookups that failed because the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProgressError::MemberNotFound(_) | ProgressError::RecordNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_does_not_name_member() {
        let msg = ProgressError::Forbidden.to_string();
        assert!(!msg.chars().any(|c| c.is_ascii_digit()));
        assert!(ProgressError::Forbidden.is_authorization());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(ProgressError::MemberNotFound(MemberId(4)).is_not_found());
        assert!(!ProgressError::EmptyRecord.is_not_found());
        assert_eq!(
            ProgressError::MemberNotFound(MemberId(4)).to_string(),
            "Member not found: 4"
        );
    }
}
