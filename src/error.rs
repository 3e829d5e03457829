// Error types module

use http::StatusCode;
use thiserror::Error;

/// Centralized error type for request handling
///
/// Categorizes failures so each one maps onto a single HTTP status.
#[derive(Debug, Error)]
pub enum WebError {
    /// The request path cannot be turned into a resource set
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// None of the requested resources exist
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The downstream handler failed or panicked
    #[error("Downstream error: {0}")]
    Downstream(String),

    /// Rule file or configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigLoad(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebError {
    /// Maps errors to HTTP status codes
    ///
    /// - MalformedRequest → 400
    /// - ResourceNotFound → 404
    /// - Downstream, ConfigLoad, Io → 500
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            WebError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            WebError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            WebError::Downstream(_) | WebError::ConfigLoad(_) | WebError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
