/// Compression error types
use thiserror::Error;

/// Errors that can occur while encoding a response body
#[derive(Debug, Clone, Error)]
pub enum CompressionError {
    /// Unknown content coding
    #[error("Invalid compression algorithm: {0}")]
    InvalidAlgorithm(String),
    /// Encoder failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),
}
