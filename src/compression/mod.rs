//! Compression module
//!
//! Response body encoding for the `Compression` directive:
//!
//! - [`algorithms`] - Content coding definitions
//! - [`compress`] - gzip, deflate and brotli encoders
//! - [`error`] - Error types
//! - [`negotiation`] - Accept-Encoding parsing and coding selection
//! - [`response`] - Compressibility checks and ETag suffixing

pub mod algorithms;
pub mod compress;
pub mod error;
pub mod negotiation;
pub mod response;

pub use algorithms::Compression;
pub use compress::compress;
pub use error::CompressionError;
pub use negotiation::negotiate_compression;
pub use response::{is_compressible_content_type, should_compress_by_size, suffix_etag};
