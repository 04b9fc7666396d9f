//! Modified UTF-8, the string encoding of class-file constants and of
//! `DataOutput.writeUTF`.
//!
//! It differs from standard UTF-8 in two ways: NUL is written as the two-byte
//! sequence `C0 80`, and supplementary characters are written as a pair of
//! three-byte encoded surrogates instead of one four-byte sequence.

/// Input that is not valid modified UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed modified UTF-8 at byte {offset}")]
pub struct Mutf8Error {
    /// Offset of the first offending byte.
    pub offset: usize,
}

/// Decodes modified UTF-8 into a string.
///
/// Unpaired surrogates cannot be represented in a Rust string and are
/// rejected.
pub fn decode(bytes: &[u8]) -> Result<String, Mutf8Error> {
    // fast path, plain ASCII without NUL is identical in both encodings
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        return String::from_utf8(bytes.to_vec()).map_err(|_| Mutf8Error { offset: 0 });
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let continuation = |k: usize| -> Result<u16, Mutf8Error> {
            match bytes.get(i + k) {
                Some(&c) if c & 0xC0 == 0x80 => Ok((c & 0x3F) as u16),
                _ => Err(Mutf8Error { offset: i }),
            }
        };
        match b >> 4 {
            0x0..=0x7 => {
                units.push(b as u16);
                i += 1;
            }
            0xC | 0xD => {
                units.push(((b & 0x1F) as u16) << 6 | continuation(1)?);
                i += 2;
            }
            0xE => {
                units.push(((b & 0x0F) as u16) << 12 | continuation(1)? << 6 | continuation(2)?);
                i += 3;
            }
            _ => return Err(Mutf8Error { offset: i }),
        }
    }

    String::from_utf16(&units).map_err(|_| Mutf8Error { offset: 0 })
}

/// Encodes a string as modified UTF-8.
pub fn encode(s: &str) -> Vec<u8> {
    if s.bytes().all(|b| b != 0 && b < 0x80) {
        return s.as_bytes().to_vec();
    }

    let mut out = Vec::with_capacity(s.len() + 8);
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
