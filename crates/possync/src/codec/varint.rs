//! Zig-zag mapping and block-varint integers.
//!
//! A block-varint is written as `block_size` value bits followed by one continuation bit,
//! repeated until the remaining value is zero. At least one block is always written, so
//! zero costs `block_size + 1` bits.

use super::{BitReader, BitWriter, CodecError};

#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub fn write_blocks(writer: &mut BitWriter, mut value: u64, block_size: u32) {
    let mask = (1u64 << block_size) - 1;
    loop {
        writer.write(value & mask, block_size);
        value >>= block_size;
        let more = value != 0;
        writer.write_bool(more);
        if !more {
            break;
        }
    }
}

pub fn read_blocks(reader: &mut BitReader<'_>, block_size: u32) -> Result<u64, CodecError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        if shift >= 64 {
            return Err(CodecError::VarIntOverflow { block_size });
        }
        let block = reader.read(block_size)?;
        value |= block << shift;
        shift += block_size;
        if !reader.read_bool()? {
            return Ok(value);
        }
    }
}

/// Bits used by [`write_blocks`] for `value`.
pub fn block_bits(value: u64, block_size: u32) -> usize {
    let significant = 64 - value.leading_zeros();
    let blocks = significant.div_ceil(block_size).max(1);
    (blocks * (block_size + 1)) as usize
}
