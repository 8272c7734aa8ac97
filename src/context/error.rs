//! Context lookup errors.

use thiserror::Error;

/// Errors returned by typed context access.
///
/// Both variants are recoverable: a failed lookup never yields a value of
/// the wrong type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Context key '{key}' not found")]
    NotFound { key: String },

    #[error("Context key '{key}' holds {found}, requested {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}
