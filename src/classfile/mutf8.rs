//! Modified UTF-8 encoding and decoding for constant-pool string payloads.
//!
//! The class-file format stores `Utf8` pool entries in *modified* UTF-8, which
//! differs from standard UTF-8 in two ways:
//!
//! - the NUL character (U+0000) is encoded as the two-byte sequence `0xC0 0x80`
//!   so that encoded strings never contain a zero byte, and
//! - supplementary characters (above U+FFFF) are encoded as a surrogate pair,
//!   each half encoded as a separate three-byte sequence (CESU-8 style);
//!   four-byte UTF-8 sequences never appear.
//!
//! Decode converts a payload to an owned [`String`]; encode produces the
//! canonical modified-UTF-8 byte run for it. Round-tripping a well-formed
//! payload is byte-lossless.
//!
//! # Usage Examples
//!
//! ```rust
//! use classcloak::classfile::mutf8;
//!
//! let bytes = mutf8::encode("java/lang/Object");
//! assert_eq!(mutf8::decode(&bytes)?, "java/lang/Object");
//!
//! // Embedded NUL uses the two-byte form
//! assert_eq!(mutf8::encode("\u{0}"), [0xC0, 0x80]);
//! # Ok::<(), classcloak::Error>(())
//! ```

use crate::Result;

/// Decode a modified-UTF-8 byte run into a [`String`].
///
/// # Arguments
/// * `bytes` - The raw `Utf8` pool-entry payload
///
/// # Errors
/// Returns [`crate::Error::CorruptFormat`] on truncated sequences, invalid
/// continuation bytes, or an unpaired surrogate half.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let code_unit = match b {
            0x01..=0x7F => {
                i += 1;
                u16::from(b)
            }
            0xC0..=0xDF => {
                let b2 = continuation(bytes, i + 1)?;
                i += 2;
                (u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F)
            }
            0xE0..=0xEF => {
                let b2 = continuation(bytes, i + 1)?;
                let b3 = continuation(bytes, i + 2)?;
                i += 3;
                (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F)
            }
            _ => {
                return Err(corrupt_format!(
                    "invalid modified-UTF-8 lead byte 0x{:02X} at offset {}",
                    b,
                    i
                ))
            }
        };

        if (0xD800..=0xDBFF).contains(&code_unit) {
            // High surrogate: the low half must follow as another 3-byte unit.
            let low = match bytes.get(i) {
                Some(0xE0..=0xEF) => {
                    let b1 = bytes[i];
                    let b2 = continuation(bytes, i + 1)?;
                    let b3 = continuation(bytes, i + 2)?;
                    (u16::from(b1 & 0x0F) << 12)
                        | (u16::from(b2 & 0x3F) << 6)
                        | u16::from(b3 & 0x3F)
                }
                _ => return Err(corrupt_format!("unpaired high surrogate at offset {}", i)),
            };
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(corrupt_format!("unpaired high surrogate at offset {}", i));
            }
            i += 3;

            let c = 0x10000
                + ((u32::from(code_unit) - 0xD800) << 10)
                + (u32::from(low) - 0xDC00);
            match char::from_u32(c) {
                Some(c) => out.push(c),
                None => return Err(corrupt_format!("invalid surrogate pair at offset {}", i)),
            }
        } else if (0xDC00..=0xDFFF).contains(&code_unit) {
            return Err(corrupt_format!("unpaired low surrogate at offset {}", i));
        } else {
            match char::from_u32(u32::from(code_unit)) {
                Some(c) => out.push(c),
                None => return Err(corrupt_format!("invalid code unit at offset {}", i)),
            }
        }
    }

    Ok(out)
}

/// Encode a string into its canonical modified-UTF-8 byte run.
///
/// # Arguments
/// * `s` - The string to encode
#[must_use]
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());

    for c in s.chars() {
        let cp = c as u32;
        match cp {
            0x0001..=0x007F => out.push(cp as u8),
            // NUL and the 2-byte range share the same shape
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((cp >> 6) as u8));
                out.push(0x80 | ((cp & 0x3F) as u8));
            }
            0x0800..=0xFFFF => push_three_byte(&mut out, cp as u16),
            _ => {
                // Supplementary plane: CESU-8 surrogate pair
                let v = cp - 0x10000;
                push_three_byte(&mut out, 0xD800 + ((v >> 10) as u16));
                push_three_byte(&mut out, 0xDC00 + ((v & 0x3FF) as u16));
            }
        }
    }

    out
}

fn push_three_byte(out: &mut Vec<u8>, unit: u16) {
    out.push(0xE0 | ((unit >> 12) as u8));
    out.push(0x80 | (((unit >> 6) & 0x3F) as u8));
    out.push(0x80 | ((unit & 0x3F) as u8));
}

fn continuation(bytes: &[u8], at: usize) -> Result<u8> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(b),
        Some(&b) => Err(corrupt_format!(
            "invalid modified-UTF-8 continuation byte 0x{:02X} at offset {}",
            b,
            at
        )),
        None => Err(corrupt_format!("truncated modified-UTF-8 sequence")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip() {
        let s = "java/lang/Object";
        assert_eq!(encode(s), s.as_bytes());
        assert_eq!(decode(s.as_bytes()).unwrap(), s);
    }

    #[test]
    fn nul_is_two_bytes() {
        let encoded = encode("a\u{0}b");
        assert_eq!(encoded, [b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&encoded).unwrap(), "a\u{0}b");
    }

    #[test]
    fn two_and_three_byte_ranges() {
        let s = "π\u{07FF}\u{0800}\u{FFFF}";
        assert_eq!(decode(&encode(s)).unwrap(), s);
    }

    #[test]
    fn supplementary_uses_surrogate_pair() {
        let s = "\u{1F600}";
        let encoded = encode(s);
        assert_eq!(encoded.len(), 6, "two 3-byte surrogate halves");
        assert_eq!(decode(&encoded).unwrap(), s);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(decode(&[0xFF]).is_err());
        assert!(decode(&[0xC2]).is_err());
        assert!(decode(&[0xE0, 0x80]).is_err());
        assert!(decode(&[0xC2, 0xC2]).is_err());
        // lone high surrogate
        assert!(decode(&[0xED, 0xA0, 0x80]).is_err());
        // lone low surrogate
        assert!(decode(&[0xED, 0xB0, 0x80]).is_err());
    }
}
