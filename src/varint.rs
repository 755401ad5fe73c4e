//! Shared varint encoding and decoding utilities.
//!
//! Used by the cursor codec, by position tokens and by the framed file
//! format. Same encoding as Protocol Buffers:
//! - Each byte has 7 bits of data and 1 continuation bit (MSB)
//! - The continuation bit indicates if more bytes follow
//! - Bytes are in little-endian order

use crate::error::VarintError;

/// Maximum encoded size of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Decode an unsigned variable-length integer.
///
/// # Arguments
/// * `data` - The input byte slice (cursor is advanced past the varint)
///
/// # Errors
/// - `VarintError::UnexpectedEof` if the input is truncated
/// - `VarintError::Overlong` if the varint exceeds 10 bytes or overflows a `u64`
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, VarintError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some((&byte, rest)) = data.split_first() else {
            return Err(VarintError::UnexpectedEof);
        };
        *data = rest;

        // The 10th byte may only carry the top bit of a u64
        if shift == 63 && byte > 1 {
            return Err(VarintError::Overlong);
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;

        // Max 10 bytes for 64-bit varint
        if shift >= 64 {
            return Err(VarintError::Overlong);
        }
    }
}

/// Append the varint encoding of `value` to `out`.
#[inline]
pub fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Encode an unsigned integer as a variable-length integer.
#[inline]
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut result = Vec::with_capacity(MAX_VARINT_LEN);
    put_varint(&mut result, value);
    result
}

/// Number of bytes `encode_varint(value)` produces.
#[inline]
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}
