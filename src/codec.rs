//! Blob codec for save/level payloads.
//!
//! Stored form is either the caller's text verbatim (raw, untagged — also
//! how legacy rows written before compression look) or
//! `GZ:`/`B64GZ:` + base64(gzip bytes). The `B64GZ:` tag records that the
//! input itself was base64, so decode re-encodes after decompression and
//! returns the exact original text.

use crate::error::HavenError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use tracing::debug;

const TAG_GZ: &str = "GZ:";
const TAG_B64GZ: &str = "B64GZ:";

/// Inputs at or below this length are never probed for base64.
const BASE64_PROBE_MIN_LEN: usize = 100;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Encode a payload for storage. Compression is used only when the final
/// tagged form is at least 10% smaller than the input; otherwise the input
/// is stored verbatim.
pub fn encode(text: &str) -> Result<String, HavenError> {
    if text.is_empty() {
        return Ok(String::new());
    }

    // Payloads that were already packed client-side arrive as base64 (no
    // literal angle brackets). Unwrapping first lets gzip see the raw bytes.
    let mut tag = TAG_GZ;
    let mut to_compress: Vec<u8> = text.as_bytes().to_vec();
    if text.len() > BASE64_PROBE_MIN_LEN && !text.contains('<') && !text.contains('>') {
        if let Ok(decoded) = BASE64.decode(text) {
            debug!(
                original = text.len(),
                unwrapped = decoded.len(),
                "base64 input detected, decoding before compression"
            );
            to_compress = decoded;
            tag = TAG_B64GZ;
        }
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(&to_compress)
        .map_err(|e| HavenError::Codec(format!("gzip write error: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| HavenError::Codec(format!("gzip close error: {e}")))?;

    let stored = format!("{tag}{}", BASE64.encode(&compressed));
    if stored.len() as f64 >= text.len() as f64 * 0.90 {
        debug!(
            original = text.len(),
            stored = stored.len(),
            "compression ineffective, storing verbatim"
        );
        return Ok(text.to_string());
    }
    Ok(stored)
}

/// Decode a stored value back to the exact text the caller supplied.
/// Untagged values are returned as-is; tagged values whose payload is not
/// base64 or lacks a gzip header are legacy raw text and also pass through.
pub fn decode(stored: &str) -> Result<String, HavenError> {
    if let Some(rest) = stored.strip_prefix(TAG_B64GZ) {
        match unpack(rest)? {
            Some(bytes) => Ok(BASE64.encode(&bytes)),
            None => Ok(stored.to_string()),
        }
    } else if let Some(rest) = stored.strip_prefix(TAG_GZ) {
        match unpack(rest)? {
            Some(bytes) => String::from_utf8(bytes)
                .map_err(|e| HavenError::Codec(format!("decompressed data not utf-8: {e}"))),
            None => Ok(stored.to_string()),
        }
    } else {
        Ok(stored.to_string())
    }
}

/// Base64-decode and gunzip a tagged payload. `Ok(None)` means the payload
/// is not actually packed (legacy raw text that happens to carry a tag
/// prefix); a truncated or corrupt gzip stream past the header is an error.
fn unpack(payload: &str) -> Result<Option<Vec<u8>>, HavenError> {
    let Ok(compressed) = BASE64.decode(payload) else {
        return Ok(None);
    };
    if compressed.len() < GZIP_MAGIC.len() || compressed[..2] != GZIP_MAGIC {
        return Ok(None);
    }
    let mut out = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut out)
        .map_err(|e| HavenError::Codec(format!("gzip read error: {e}")))?;
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trips_to_empty() {
        let stored = encode("").unwrap();
        assert_eq!(stored, "");
        assert_eq!(decode(&stored).unwrap(), "");
    }

    #[test]
    fn markup_payload_is_compressed_and_round_trips() {
        let text = "<level><block x=\"1\" y=\"2\"/></level>".repeat(200);
        let stored = encode(&text).unwrap();
        assert!(stored.starts_with("GZ:"));
        assert!(stored.len() < text.len());
        assert_eq!(decode(&stored).unwrap(), text);
    }

    #[test]
    fn base64_payload_keeps_exact_textual_form() {
        let text = BASE64.encode("player:42;".repeat(100));
        assert!(text.len() > 100);
        let stored = encode(&text).unwrap();
        assert!(stored.starts_with("B64GZ:"));
        assert_eq!(decode(&stored).unwrap(), text);
    }

    #[test]
    fn short_input_is_stored_verbatim() {
        // gzip framing plus base64 can only inflate a few bytes
        let text = "<a/>";
        let stored = encode(text).unwrap();
        assert_eq!(stored, text);
        assert_eq!(decode(&stored).unwrap(), text);
    }

    #[test]
    fn legacy_untagged_value_passes_through() {
        let stored = "plain old save data <g>1</g>";
        assert_eq!(decode(stored).unwrap(), stored);
    }

    #[test]
    fn tag_lookalike_raw_text_round_trips() {
        // short enough that encode keeps it verbatim; decode must then
        // recognize the payload is not actually packed
        for text in ["GZ:junk!!!", "GZ:anVuaw==", "B64GZ:hello"] {
            let stored = encode(text).unwrap();
            assert_eq!(stored, text);
            assert_eq!(decode(&stored).unwrap(), text);
        }
    }

    #[test]
    fn corrupt_gzip_stream_is_an_error() {
        let mut compressed = {
            let mut enc = GzEncoder::new(Vec::new(), Compression::best());
            enc.write_all(&[b'x'; 4096]).unwrap();
            enc.finish().unwrap()
        };
        compressed.truncate(compressed.len() / 2);
        let stored = format!("GZ:{}", BASE64.encode(&compressed));
        assert!(decode(&stored).is_err());
    }
}
