//! Little-endian field extraction from N2K payloads
//!
//! Fields past the end of a (possibly truncated) payload read as "not
//! available": `None` for integer accessors, NaN for the scaled accessors.

use byteorder::{ByteOrder, LittleEndian};

/// Converts the 0.0001 rad units used by angle fields to degrees
pub const N2K_TO_DEGREES: f64 = 0.0057295779513082332;

/// Read-only view over a frame payload
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    data: &'a [u8],
}

impl<'a> Payload<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn bytes(&self, offset: usize, count: usize) -> Option<&'a [u8]> {
        self.data.get(offset..offset.checked_add(count)?)
    }

    pub fn u8(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    pub fn u16(&self, offset: usize) -> Option<u16> {
        self.bytes(offset, 2).map(LittleEndian::read_u16)
    }

    pub fn u32(&self, offset: usize) -> Option<u32> {
        self.bytes(offset, 4).map(LittleEndian::read_u32)
    }

    pub fn i16(&self, offset: usize) -> Option<i16> {
        self.bytes(offset, 2).map(LittleEndian::read_i16)
    }

    /// Raw unsigned value of `bits` width (8, 16, 32 or 64)
    pub fn raw_unsigned(&self, offset: usize, bits: u32) -> Option<u64> {
        let width = field_bytes(bits)?;
        self.bytes(offset, width).map(|b| LittleEndian::read_uint(b, width))
    }

    /// Raw signed value of `bits` width (8, 16, 32 or 64)
    pub fn raw_signed(&self, offset: usize, bits: u32) -> Option<i64> {
        let width = field_bytes(bits)?;
        self.bytes(offset, width).map(|b| LittleEndian::read_int(b, width))
    }

    /// Unsigned field as f64; the all-ones value is NaN
    pub fn unsigned(&self, offset: usize, bits: u32) -> f64 {
        match self.raw_unsigned(offset, bits) {
            Some(v) if is_unsigned_sentinel(v, bits) => f64::NAN,
            Some(v) => v as f64,
            None => f64::NAN,
        }
    }

    /// Signed field as f64; the minimum and 2^(bits-1) are NaN
    pub fn signed(&self, offset: usize, bits: u32) -> f64 {
        match self.raw_signed(offset, bits) {
            Some(v) if is_signed_sentinel(v, bits) => f64::NAN,
            Some(v) => v as f64,
            None => f64::NAN,
        }
    }
}

fn field_bytes(bits: u32) -> Option<usize> {
    match bits {
        8 | 16 | 32 | 64 => Some((bits / 8) as usize),
        _ => None,
    }
}

fn is_unsigned_sentinel(value: u64, bits: u32) -> bool {
    let max = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    value == max
}

fn is_signed_sentinel(value: i64, bits: u32) -> bool {
    let half = 1i128 << (bits - 1);
    let v = i128::from(value);
    v == -half || v == half
}
