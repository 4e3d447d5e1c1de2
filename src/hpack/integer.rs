//! RFC 7541 §5.1 integer representation: an N-bit prefix followed by
//! base-128 continuation octets.
//!
//! Ported from the original runtime's `IntegerEncoder`/`IntegerDecoder`
//! (`include/ilias/http/detail/integer.hpp`) into the crate's `Result`
//! idiom rather than the original's own error type.

use crate::error::{HpackErrorKind, Result};

/// Encodes `value` using an `prefix_bits`-bit prefix into `out`, and'ing
/// the prefix byte's unused high bits with whatever is already set in
/// `out`'s last unfilled byte (the representation-type bits a caller
/// wrote before calling this).
///
/// `prefix_bits` must be in `1..=8`.
pub fn encode(value: u64, prefix_bits: u8, out: &mut Vec<u8>) {
    debug_assert!((1..=8).contains(&prefix_bits));
    let max_prefix = (1u64 << prefix_bits) - 1;
    if value < max_prefix {
        *out.last_mut().unwrap() |= value as u8;
        return;
    }
    *out.last_mut().unwrap() |= max_prefix as u8;
    let mut remaining = value - max_prefix;
    while remaining >= 128 {
        out.push(((remaining % 128) as u8) | 0x80);
        remaining /= 128;
    }
    out.push(remaining as u8);
}

/// Decodes an integer whose prefix occupies the low `prefix_bits` bits of
/// `buf[0]`, returning the value and how many bytes of `buf` it consumed.
pub fn decode(buf: &[u8], prefix_bits: u8) -> Result<(u64, usize)> {
    debug_assert!((1..=8).contains(&prefix_bits));
    if buf.is_empty() {
        return Err(HpackErrorKind::NeedMoreData.into());
    }
    let max_prefix = (1u64 << prefix_bits) - 1;
    let prefix_value = (buf[0] as u64) & max_prefix;
    if prefix_value < max_prefix {
        return Ok((prefix_value, 1));
    }

    let mut value = max_prefix;
    let mut shift: u32 = 0;
    let mut consumed = 1;
    loop {
        let byte = *buf
            .get(consumed)
            .ok_or(HpackErrorKind::NeedMoreData)?;
        consumed += 1;
        let continuation = (byte & 0x80) != 0;
        let digit = (byte & 0x7f) as u64;
        let term = digit
            .checked_shl(shift)
            .ok_or(HpackErrorKind::IntegerOverflow)?;
        value = value.checked_add(term).ok_or(HpackErrorKind::IntegerOverflow)?;
        if !continuation {
            break;
        }
        shift += 7;
        if shift >= 64 {
            return Err(HpackErrorKind::IntegerOverflow.into());
        }
    }
    Ok((value, consumed))
}
