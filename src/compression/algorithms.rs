/// Compression algorithm definitions
use std::fmt;
use std::str::FromStr;

use super::error::CompressionError;

/// Supported content codings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// GZIP (RFC 1952)
    Gzip,
    /// DEFLATE (RFC 1951)
    Deflate,
    /// Brotli (RFC 7932)
    Brotli,
}

impl Compression {
    /// Server preference order used for `*` and ties
    pub const PREFERENCE: [Compression; 3] =
        [Compression::Gzip, Compression::Brotli, Compression::Deflate];

    /// HTTP Content-Encoding header value
    pub fn to_header_value(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Brotli => "br",
            Compression::Deflate => "deflate",
        }
    }

    /// Suffix appended to an ETag when the body is encoded with this coding
    pub fn etag_suffix(&self) -> String {
        format!("-{}", self.to_header_value())
    }

    /// Parse a content coding name (case-insensitive)
    pub fn parse_algorithm(s: &str) -> Result<Self, CompressionError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Ok(Compression::Gzip),
            "br" | "brotli" => Ok(Compression::Brotli),
            "deflate" => Ok(Compression::Deflate),
            other => Err(CompressionError::InvalidAlgorithm(other.to_string())),
        }
    }
}

impl FromStr for Compression {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_algorithm(s)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_header_value())
    }
}
