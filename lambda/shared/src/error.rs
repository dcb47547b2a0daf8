use lambda_http::http::StatusCode;
use thiserror::Error;

/// Errors raised while reading the environment at cold start.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is unset or empty
    #[error("{0} not set")]
    Missing(&'static str),
}

/// Errors from the storage layer.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// DynamoDB service or transport failure
    #[error("DynamoDB error: {0}")]
    Sdk(String),

    /// The table answered but the response lacked something we need
    #[error("Malformed storage response: {0}")]
    Malformed(String),
}

/// Errors converting stored attributes into JSON.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// A numeric attribute that does not parse as a finite float
    #[error("Invalid number attribute: {0}")]
    InvalidNumber(String),

    /// An attribute type this API does not know how to render
    #[error("Unsupported attribute type: {0}")]
    Unsupported(String),
}

/// Everything a handler can fail with. Each variant maps to one HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller input failed a precondition (400)
    #[error("{0}")]
    Validation(String),

    /// Referenced record does not exist (404)
    #[error("{0}")]
    NotFound(String),

    /// No route for this method and path (404)
    #[error("Not found")]
    Unrouted,

    /// Storage dependency failed (500)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored data could not be rendered (500)
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Anything else, including caught panics (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::Unrouted => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Conversion(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message placed in the response body. Internal faults are not exposed.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<lambda_http::http::Error> for ApiError {
    fn from(err: lambda_http::http::Error) -> Self {
        Self::Internal(format!("failed to build response: {err}"))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("failed to serialize response: {err}"))
    }
}
