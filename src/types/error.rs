//! Error types for Missionboard
//!
//! Every failure surfaced to a caller is one of these variants. HTTP handlers
//! map them to a status code and a `{ok:false, error}` body.

use hyper::StatusCode;

/// Main error type for Missionboard operations
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// A required identifier was missing, empty, or not a string.
    /// Raised before any storage access.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The persistence layer could not complete an operation.
    /// Callers may retry; claim and retract are idempotent.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The request body exceeded the accepted size.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoardError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for BoardError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArgument(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for BoardError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for Missionboard operations
pub type Result<T> = std::result::Result<T, BoardError>;
