use thiserror::Error;

/// Malformed operation descriptors at the JSON boundary
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid arguments for {action}: {source}")]
    InvalidArguments {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
