//! Minimal PEM armor
//!
//! Mesh certificates and root bundles travel as one or more PEM blocks;
//! decoding yields the first block plus the remaining input.

use crate::error::{NebulaError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const BEGIN: &str = "-----BEGIN ";
const DASHES: &str = "-----";
const LINE_WIDTH: usize = 64;

/// A decoded PEM block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// The label between `BEGIN` and the closing dashes
    pub label: String,
    /// Decoded payload
    pub contents: Vec<u8>,
}

/// Armor `contents` under `label`
pub fn encode(label: &str, contents: &[u8]) -> Vec<u8> {
    let body = STANDARD.encode(contents);
    let mut out = format!("{BEGIN}{label}{DASHES}\n");
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}{DASHES}\n"));
    out.into_bytes()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode the first PEM block in `input`
///
/// Returns `Ok(None)` when the input holds no further block. Bytes before the
/// first `BEGIN` line are skipped unread.
pub fn decode(input: &[u8]) -> Result<Option<(PemBlock, &[u8])>> {
    let Some(begin) = find(input, BEGIN.as_bytes()) else {
        return Ok(None);
    };

    let label_start = begin + BEGIN.len();
    let label_len = find(&input[label_start..], DASHES.as_bytes())
        .ok_or_else(|| NebulaError::Pem("unterminated BEGIN line".into()))?;
    let label = std::str::from_utf8(&input[label_start..label_start + label_len])
        .map_err(|e| NebulaError::Pem(format!("label is not valid UTF-8: {e}")))?;
    if label.contains('\n') {
        return Err(NebulaError::Pem("unterminated BEGIN line".into()));
    }

    let body_start = label_start + label_len + DASHES.len();
    let end_marker = format!("-----END {label}{DASHES}");
    let body_len = find(&input[body_start..], end_marker.as_bytes())
        .ok_or_else(|| NebulaError::Pem(format!("missing END line for {label}")))?;
    let body: Vec<u8> = input[body_start..body_start + body_len]
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let contents = STANDARD
        .decode(&body)
        .map_err(|e| NebulaError::Pem(format!("invalid base64 body: {e}")))?;

    let mut rest = &input[body_start + body_len + end_marker.len()..];
    if let Some(stripped) = rest.strip_prefix(b"\r\n") {
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix(b"\n") {
        rest = stripped;
    }

    Ok(Some((
        PemBlock {
            label: label.to_string(),
            contents,
        },
        rest,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let payload = vec![7u8; 100];
        let pem = encode("NEBULA CERTIFICATE", &payload);
        let (block, rest) = decode(&pem).unwrap().unwrap();
        assert_eq!(block.label, "NEBULA CERTIFICATE");
        assert_eq!(block.contents, payload);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_decode_bundle_in_order() {
        let mut bundle = b"# roots\n".to_vec();
        bundle.extend(encode("A", b"first"));
        bundle.extend(encode("B", b"second"));
        let (a, rest) = decode(&bundle).unwrap().unwrap();
        let (b, rest) = decode(rest).unwrap().unwrap();
        assert_eq!(a.contents, b"first");
        assert_eq!(b.label, "B");
        assert!(decode(rest).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_broken_armor() {
        assert!(decode(b"-----BEGIN X-----\nAAAA\n").is_err());
        assert!(decode(b"-----BEGIN X-----\n!!!!\n-----END X-----\n").is_err());
        assert!(decode(b"no pem here").unwrap().is_none());
    }

    #[test]
    fn test_decode_skips_binary_outside_armor() {
        let mut bundle = b"# r\xe9sum\xe9 \xff\xfe\n".to_vec();
        bundle.extend(encode("A", b"first"));
        bundle.extend(b"\xff trailing");
        let (block, rest) = decode(&bundle).unwrap().unwrap();
        assert_eq!(block.contents, b"first");
        assert_eq!(rest, b"\xff trailing");
        assert!(decode(rest).unwrap().is_none());
    }
}
