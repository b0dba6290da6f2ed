//! Hex framing for opaque peripheral payloads
//!
//! Commands carry their bytes as hex text. Decoding is deliberately
//! permissive: it never fails, garbage just turns into zero bytes.

use data_encoding::HEXLOWER;

/// Decode hex text into bytes, two characters per byte.
///
/// A trailing unpaired character is ignored. Each pair is read like
/// `strtol(pair, 16)`: a pair starting with a non-hex character is `0`, and
/// a hex digit followed by a non-hex character is that digit's value.
pub fn decode_hex(text: &str) -> Vec<u8> {
    text.as_bytes()
        .chunks_exact(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => (hi << 4) | lo,
            (Some(hi), None) => hi,
            (None, _) => 0,
        })
        .collect()
}

/// Lowercase hex text for bytes
pub fn encode_hex(data: &[u8]) -> String {
    HEXLOWER.encode(data)
}

fn nibble(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}
