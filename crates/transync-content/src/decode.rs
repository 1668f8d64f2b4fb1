//! Body decoding predicates
//!
//! Pure functions; none of them touch the network.

use flate2::read::GzDecoder;
use std::io::Read;

/// Gzip member header
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Bytes inspected by [`looks_binary`]
pub const BINARY_SAMPLE_LEN: usize = 1_000;

/// Control-character share above which a body counts as binary
pub const BINARY_CONTROL_RATIO: f64 = 0.10;

#[inline]
fn is_control_byte(b: u8) -> bool {
    (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r')) || b == 0x7f
}

/// True if the body starts with the gzip magic number
#[inline]
#[must_use]
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// True if more than 10% of the first 1000 bytes are control characters
#[must_use]
pub fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(BINARY_SAMPLE_LEN)];
    if sample.is_empty() {
        return false;
    }
    let controls = sample.iter().filter(|b| is_control_byte(**b)).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = controls as f64 / sample.len() as f64;
    ratio > BINARY_CONTROL_RATIO
}

/// Remove control characters other than tab and line breaks
#[must_use]
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Inflate a gzip body
///
/// # Errors
/// Returns the inflate error if the stream is truncated or corrupt.
pub fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len() * 4);
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Turn a raw origin body into text
///
/// Gzip payloads are inflated first. Bodies that look binary are given
/// one recovery pass (UTF-8 re-decode, then control-character stripping);
/// `None` means this attempt produced nothing usable and the caller should
/// move on to its next strategy.
#[must_use]
pub fn decode_body(bytes: &[u8]) -> Option<String> {
    let inflated;
    let bytes = if is_gzip(bytes) {
        match gunzip(bytes) {
            Ok(out) => {
                inflated = out;
                inflated.as_slice()
            }
            Err(err) => {
                tracing::debug!(error = %err, "gzip prefix but inflate failed");
                return None;
            }
        }
    } else {
        bytes
    };

    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    if !looks_binary(bytes) {
        return Some(String::from_utf8_lossy(bytes).into_owned());
    }

    recover_binary(bytes)
}

fn recover_binary(bytes: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        let cleaned = strip_control_chars(text);
        if !cleaned.trim().is_empty() {
            return Some(cleaned);
        }
    }

    let lossy = String::from_utf8_lossy(bytes);
    let cleaned = strip_control_chars(&lossy);
    let total = cleaned.chars().count();
    if total == 0 {
        return None;
    }
    let replaced = cleaned.chars().filter(|c| *c == char::REPLACEMENT_CHARACTER).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = replaced as f64 / total as f64;
    if ratio > BINARY_CONTROL_RATIO {
        tracing::debug!(ratio, "body still binary after recovery");
        None
    } else {
        Some(cleaned.replace(char::REPLACEMENT_CHARACTER, ""))
    }
}
