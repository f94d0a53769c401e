//! Error types for submission grading

use crate::cell::Cell;
use thiserror::Error;

/// Errors raised while building the encoding table or grading a submission.
///
/// The three data-quality kinds (`ShapeMismatch`, `InvalidType`,
/// `UnknownLabel`) carry enough context to be shown to the submitter as-is.
#[derive(Debug, Error)]
pub enum GradeError {
    /// Predicted sequence length differs from the ground truth length
    #[error("Submission has incorrect shape. Given {given}, expected {expected}")]
    ShapeMismatch { given: usize, expected: usize },

    /// An entry has the wrong primitive type
    #[error("Label {index} ({value}) is {} instead of a string.", .value.kind())]
    InvalidType { index: usize, value: Cell },

    /// An entry is a string but not one of the reference labels
    #[error("Label {index} ({value}) is not a valid label.")]
    UnknownLabel { index: usize, value: String },

    /// The expected label column is not in the table header
    #[error("Column '{column}' not found (available: {available})")]
    MissingColumn { column: String, available: String },

    /// The reference data contains no labels
    #[error("Reference label set is empty")]
    EmptyReference,

    /// A reference label would not be read back as text from a submission,
    /// so no submission could ever match it
    #[error("Reference label {index} ({value}) is {} instead of a string.", .value.kind())]
    InvalidReference { index: usize, value: Cell },

    /// Malformed CSV input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GradeError {
    /// Whether the error describes a problem with the submitted data rather
    /// than with the grader setup.
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            GradeError::ShapeMismatch { .. }
                | GradeError::InvalidType { .. }
                | GradeError::UnknownLabel { .. }
                | GradeError::MissingColumn { .. }
                | GradeError::Csv(_)
        )
    }

    /// Offending row index, when the error points at a single entry
    pub fn index(&self) -> Option<usize> {
        match self {
            GradeError::InvalidType { index, .. } | GradeError::UnknownLabel { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

/// Result type for grading operations
pub type Result<T> = std::result::Result<T, GradeError>;
