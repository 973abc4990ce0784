//! Bitfield access on raw little-endian storage.
//!
//! A [`BitField`] is placed relative to its field's byte offset; `storage`
//! here starts at that byte.

use crate::BitField;

#[inline]
fn in_bounds(storage_len: usize, bits: BitField) -> bool {
    let end = u64::from(bits.offset) + u64::from(bits.width);
    (1..=64).contains(&bits.width) && end <= storage_len as u64 * 8
}

/// Read the raw, zero-extended value of a bitfield.
///
/// `None` when the width is outside `1..=64` or the field does not fit in
/// `storage`.
pub fn read_bits(storage: &[u8], bits: BitField) -> Option<u64> {
    if !in_bounds(storage.len(), bits) {
        return None;
    }
    let mut value = 0u64;
    for i in 0..bits.width {
        let pos = (bits.offset + i) as usize;
        let bit = (storage[pos / 8] >> (pos % 8)) & 1;
        value |= u64::from(bit) << i;
    }
    Some(value)
}

/// Store the low `bits.width` bits of `value`, leaving neighbouring bits
/// untouched. Returns `false` if the field does not fit.
pub fn write_bits(storage: &mut [u8], bits: BitField, value: u64) -> bool {
    if !in_bounds(storage.len(), bits) {
        return false;
    }
    for i in 0..bits.width {
        let pos = (bits.offset + i) as usize;
        let mask = 1u8 << (pos % 8);
        if (value >> i) & 1 == 1 {
            storage[pos / 8] |= mask;
        } else {
            storage[pos / 8] &= !mask;
        }
    }
    true
}

/// Interpret the low `width` bits of `value` as two's complement.
#[expect(
    clippy::cast_possible_wrap,
    reason = "reinterpreting the shifted bit pattern is the point"
)]
pub fn sign_extend(value: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value as i64;
    }
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
