//! Ascii85 binary-to-text codec.
//!
//! Encodes 4-byte groups into 5 characters from `!` (33) through `u` (117).
//! Input is zero-padded to a multiple of 4 and no `z` shorthand is emitted,
//! so the output length is always `5 * ceil(len / 4)` and the decoded
//! buffer retains the padding. Callers that need exact lengths carry them
//! alongside (see [`Envelope::binary`](crate::envelope::Envelope::binary)).

use thiserror::Error;

const RADIX: u64 = 85;
const OFFSET: u8 = 33;

/// Decode failures for Ascii85 text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ascii85Error {
    /// Input length is not a multiple of 5.
    #[error("ascii85 input length {0} is not a multiple of 5")]
    Length(usize),
    /// A character outside `!`..=`u`.
    #[error("invalid ascii85 character {0:?}")]
    Character(char),
    /// A 5-character group decodes past `u32::MAX`.
    #[error("ascii85 group overflows 32 bits")]
    Overflow,
}

/// Encodes `data`, zero-padding to a 4-byte boundary.
#[must_use]
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(4) * 5);
    for chunk in data.chunks(4) {
        let mut group = [0_u8; 4];
        group[..chunk.len()].copy_from_slice(chunk);
        let mut n = u64::from(u32::from_be_bytes(group));
        let mut digits = [0_u8; 5];
        for d in digits.iter_mut().rev() {
            *d = (n % RADIX) as u8 + OFFSET;
            n /= RADIX;
        }
        for d in digits {
            out.push(d as char);
        }
    }
    out
}

/// Decodes `text` back to bytes, including any zero padding.
pub fn decode(text: &str) -> Result<Vec<u8>, Ascii85Error> {
    let bytes = text.as_bytes();
    if bytes.len() % 5 != 0 {
        return Err(Ascii85Error::Length(bytes.len()));
    }
    let mut out = Vec::with_capacity(bytes.len() / 5 * 4);
    for group in bytes.chunks_exact(5) {
        let mut n: u64 = 0;
        for b in group {
            if !(OFFSET..=OFFSET + 84).contains(b) {
                return Err(Ascii85Error::Character(*b as char));
            }
            n = n * RADIX + u64::from(b - OFFSET);
        }
        let n = u32::try_from(n).map_err(|_| Ascii85Error::Overflow)?;
        out.extend_from_slice(&n.to_be_bytes());
    }
    Ok(out)
}
