//! Error handling types for edit-provenance
//!
//! Malformed edits are programming errors and panic at the point of
//! construction. Everything in this module is for conditions a caller can
//! recover from: diff budgets running out, configuration problems and
//! documents that are no longer tracked.

use std::sync::PoisonError;
use thiserror::Error;

/// Comprehensive error type for provenance tracking operations
#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// Replacements are unsorted, overlapping or out of bounds
    #[error("Invalid edit: {message}")]
    InvalidEdit { message: String },

    /// Diff computation did not finish within its budget
    #[error("Diff computation exceeded its budget of {budget_ms}ms")]
    DiffTimeout { budget_ms: u64 },

    /// Diff computation failed for another reason
    #[error("Diff computation failed: {message}")]
    DiffFailed { message: String },

    /// Reason data did not have the shape a stage relies on
    #[error("Unexpected reason data: {message}")]
    UnexpectedReasonShape { message: String },

    /// Document is not tracked by the controller
    #[error("Document not found: {uri}")]
    DocumentNotFound { uri: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Document identifier is not a valid URI
    #[error("Invalid document URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for provenance tracking operations
pub type ProvenanceResult<T> = Result<T, ProvenanceError>;

/// Helper trait for recovering from poisoned `std::sync::Mutex` locks.
///
/// The poisoned guard is taken over and the recovery is logged.
pub trait LockResultExt<T> {
    /// The context parameter identifies which operation triggered lock recovery.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "edit_provenance::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

/// Helper functions for common error patterns
impl ProvenanceError {
    /// Create an invalid edit error
    pub fn invalid_edit(message: impl Into<String>) -> Self {
        ProvenanceError::InvalidEdit {
            message: message.into(),
        }
    }

    /// Create a diff failure error
    pub fn diff_failed(message: impl Into<String>) -> Self {
        ProvenanceError::DiffFailed {
            message: message.into(),
        }
    }

    /// Create an unexpected reason shape error
    pub fn unexpected_reason_shape(message: impl Into<String>) -> Self {
        ProvenanceError::UnexpectedReasonShape {
            message: message.into(),
        }
    }

    /// Create a document not found error
    pub fn document_not_found(uri: impl Into<String>) -> Self {
        ProvenanceError::DocumentNotFound { uri: uri.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        ProvenanceError::Config {
            message: message.into(),
        }
    }
}
