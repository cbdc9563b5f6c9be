//! Base-128 varint and zigzag transforms.
//!
//! These are pure functions; the coded streams route every varint-encoded
//! value through them.

use crate::error::{Error, Result};
use bytes::BufMut;

/// A 64-bit value never needs more than ten varint bytes.
pub const MAX_VARINT_LEN: usize = 10;

/// Encode a varint into `buf`, least significant group first.
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed. Bits past the
/// 64th are discarded, matching how 32-bit values are sign-extended on the
/// wire.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(Error::malformed_varint(0));
        }

        if shift < 64 {
            result |= u64::from(byte & 0x7F) << shift;
        }
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    if data.len() >= MAX_VARINT_LEN {
        Err(Error::malformed_varint(0))
    } else {
        Err(Error::truncated())
    }
}

/// Exact number of bytes [`encode_varint`] writes for `value`.
pub const fn varint_len(value: u64) -> usize {
    // Each byte carries 7 bits; a zero still takes one byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Map a signed 32-bit value so small magnitudes stay small.
pub const fn encode_zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Inverse of [`encode_zigzag32`].
pub const fn decode_zigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Map a signed 64-bit value so small magnitudes stay small.
pub const fn encode_zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`encode_zigzag64`].
pub const fn decode_zigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
