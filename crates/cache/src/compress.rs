//! Payload compression.
//!
//! Gzip is kept only when it shrinks the payload below [`KEEP_RATIO`] of its
//! original size; otherwise the caller stores the raw form. Failures are
//! never surfaced, they just mean "store it raw".

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Compressed output must be strictly smaller than this fraction of the input.
pub const KEEP_RATIO: f64 = 0.8;

/// Gzip `raw`, returning the bytes only if they beat [`KEEP_RATIO`].
pub fn compress(raw: &str) -> Option<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let compressed = match encoder.write_all(raw.as_bytes()).and_then(|_| encoder.finish()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Compression failed; keeping raw payload");
            return None;
        }
    };

    if (compressed.len() as f64) < raw.len() as f64 * KEEP_RATIO { Some(compressed) } else { None }
}

/// Inverse of [`compress`]. None if the bytes are not valid gzip'd UTF-8.
pub fn decompress(bytes: &[u8]) -> Option<String> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = String::new();
    match decoder.read_to_string(&mut out) {
        Ok(_) => Some(out),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decompress cache payload");
            None
        }
    }
}
