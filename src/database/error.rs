use thiserror::Error;

use crate::filter::FilterError;

/// Errors raised by a store while executing an operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated on {model}.{field}")]
    UniqueViolation { model: String, field: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Filter(#[from] FilterError),
}
