//! Body encoders
use std::io::Write;

use super::algorithms::Compression;
use super::error::CompressionError;

/// Encode `data` with the given coding
///
/// `level` is 1-9 for gzip/deflate and clamped to 0-11 for brotli.
pub fn compress(
    data: &[u8],
    algorithm: Compression,
    level: u32,
) -> Result<Vec<u8>, CompressionError> {
    let failed = |e: std::io::Error| CompressionError::CompressionFailed(e.to_string());
    match algorithm {
        Compression::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(
                Vec::with_capacity(data.len() / 2),
                flate2::Compression::new(level.min(9)),
            );
            encoder.write_all(data).map_err(failed)?;
            encoder.finish().map_err(failed)
        }
        Compression::Deflate => {
            let mut encoder = flate2::write::DeflateEncoder::new(
                Vec::with_capacity(data.len() / 2),
                flate2::Compression::new(level.min(9)),
            );
            encoder.write_all(data).map_err(failed)?;
            encoder.finish().map_err(failed)
        }
        Compression::Brotli => {
            let mut output = Vec::with_capacity(data.len() / 2);
            let params = brotli::enc::BrotliEncoderParams {
                quality: level.min(11) as i32,
                ..Default::default()
            };
            brotli::BrotliCompress(&mut std::io::Cursor::new(data), &mut output, &params)
                .map_err(failed)?;
            Ok(output)
        }
    }
}
