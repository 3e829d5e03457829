/// Accept-Encoding header parsing and content coding negotiation
use std::str::FromStr;

use super::algorithms::Compression;

/// Single entry of an Accept-Encoding header with its quality value
#[derive(Debug, Clone, PartialEq)]
struct EncodingPreference {
    encoding: String,
    quality: f32,
}

impl EncodingPreference {
    /// Parse `gzip;q=0.8`
    fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(';');
        let encoding = parts.next()?.trim().to_ascii_lowercase();
        if encoding.is_empty() {
            return None;
        }
        let quality = parts
            .filter_map(|p| p.trim().strip_prefix("q="))
            .next()
            .and_then(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        Some(Self { encoding, quality })
    }
}

/// Pick the content coding for a response
///
/// # Arguments
/// * `accept_encoding` - Accept-Encoding request header, if any
/// * `enabled` - Codings the server is willing to use, in server preference order
///
/// # Returns
/// `None` when the client sent no header, prefers `identity`, or accepts
/// nothing the server offers.
pub fn negotiate_compression(
    accept_encoding: Option<&str>,
    enabled: &[Compression],
) -> Option<Compression> {
    let accept_encoding = accept_encoding?;

    let mut preferences: Vec<EncodingPreference> = accept_encoding
        .split(',')
        .filter_map(EncodingPreference::parse)
        .filter(|p| p.quality > 0.0)
        .collect();

    // Stable sort keeps client order for equal quality values
    preferences.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for pref in preferences {
        match pref.encoding.as_str() {
            "identity" => return None,
            "*" => return enabled.first().copied(),
            name => {
                if let Ok(algo) = Compression::from_str(name) {
                    if enabled.contains(&algo) {
                        return Some(algo);
                    }
                }
            }
        }
    }

    None
}
