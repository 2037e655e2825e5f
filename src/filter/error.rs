use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}
