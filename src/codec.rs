//! # Wire Codec
//!
//! Primitive encode/decode for the protocol's wire format: fixed-width
//! integers and doubles in host byte order, length-prefixed strings, no
//! padding. Encoding writes into a pre-sized buffer at an offset;
//! decoding reads from a [`Cursor`] that tracks its own position and
//! fails with [`NetOffError::Codec`] on truncation.

use crate::error::{NetOffError, Result};

/// A read-only cursor over a byte slice, used to decode primitives and
/// the composite types built on top of them without threading an offset
/// through every call by hand.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(NetOffError::Codec(format!(
                "tried to read {} bytes with only {} remaining",
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(NetOffError::Codec(format!(
                "invalid bool byte: {other}"
            ))),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(i32::from_ne_bytes(bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(u32::from_ne_bytes(bytes))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(u64::from_ne_bytes(bytes))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(f64::from_ne_bytes(bytes))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u64()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.take(len)?.to_vec())
    }
}

/// Writes `value` into `buf` at `offset`, returning the offset just past it.
pub fn write_u8(buf: &mut [u8], offset: usize, value: u8) -> usize {
    buf[offset] = value;
    offset + 1
}

pub fn write_bool(buf: &mut [u8], offset: usize, value: bool) -> usize {
    write_u8(buf, offset, if value { 1 } else { 0 })
}

pub fn write_i32(buf: &mut [u8], offset: usize, value: i32) -> usize {
    buf[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    offset + 4
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) -> usize {
    buf[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    offset + 4
}

pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) -> usize {
    buf[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
    offset + 8
}

pub fn write_f64(buf: &mut [u8], offset: usize, value: f64) -> usize {
    buf[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
    offset + 8
}

pub fn write_string(buf: &mut [u8], offset: usize, value: &str) -> usize {
    let bytes = value.as_bytes();
    let offset = write_u64(buf, offset, bytes.len() as u64);
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    offset + bytes.len()
}

/// Serialized size of a length-prefixed string.
pub fn string_size(value: &str) -> usize {
    8 + value.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitives() {
        let mut buf = [0u8; 64];
        let mut off = 0;
        off = write_i32(&mut buf, off, -42);
        off = write_u64(&mut buf, off, 0xdead_beef);
        off = write_f64(&mut buf, off, 3.5);
        off = write_bool(&mut buf, off, true);
        write_string(&mut buf[off..], 0, "hi");

        let mut c = Cursor::new(&buf);
        assert_eq!(c.read_i32().unwrap(), -42);
        assert_eq!(c.read_u64().unwrap(), 0xdead_beef);
        assert_eq!(c.read_f64().unwrap(), 3.5);
        assert!(c.read_bool().unwrap());
        assert_eq!(c.read_string().unwrap(), "hi");
    }

    #[test]
    fn truncated_read_is_codec_error() {
        let buf = [0u8; 2];
        let mut c = Cursor::new(&buf);
        assert!(matches!(c.read_i32(), Err(NetOffError::Codec(_))));
    }
}
