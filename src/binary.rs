//! Big-endian binary reading and writing shared by the class-file and
//! plugin-cache codecs.
//!
//! Reads never go past the end of the input: every accessor checks the
//! remaining length first and reports the offset it stopped at.

use crate::{Error, Result};

/// Which decoder a [`ByteReader`] reports errors for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Class,
    PluginCache,
}

/// Bounds-checked cursor over a byte slice.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    format: Format,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8], format: Format) -> Self {
        Self {
            data,
            pos: 0,
            format,
        }
    }

    /// Current offset from the start of the input.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Builds a decode error at the current offset.
    pub(crate) fn corrupt(&self, reason: impl Into<String>) -> Error {
        self.corrupt_at(self.pos, reason)
    }

    pub(crate) fn corrupt_at(&self, offset: usize, reason: impl Into<String>) -> Error {
        let reason = reason.into();
        match self.format {
            Format::Class => Error::CorruptClass { offset, reason },
            Format::PluginCache => Error::CorruptPluginCache { offset, reason },
        }
    }

    pub(crate) fn bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(self.corrupt(format!(
                "unexpected end of data: need {} bytes, {} left",
                count,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    /// Reads a count that must be non-negative.
    pub(crate) fn count(&mut self) -> Result<usize> {
        let start = self.pos;
        let value = self.i32()?;
        usize::try_from(value).map_err(|_| self.corrupt_at(start, format!("negative count {}", value)))
    }

    /// Reads a boolean stored as one byte, zero meaning false.
    pub(crate) fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    /// Reads a `u16`-length-prefixed modified UTF-8 string.
    pub(crate) fn utf(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let start = self.pos;
        let raw = self.bytes(len)?;
        crate::mutf8::decode(raw).map_err(|e| self.corrupt_at(start, e.to_string()))
    }

    /// Reads a `u16` count followed by that many `u16` values.
    pub(crate) fn u16_table(&mut self) -> Result<Vec<u16>> {
        let count = self.u16()? as usize;
        (0..count).map(|_| self.u16()).collect()
    }
}

/// Appends big-endian values to a byte buffer.
pub(crate) trait ByteWriter {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_u32(&mut self, value: u32);

    fn put_i32(&mut self, value: i32) {
        self.put_u32(value as u32);
    }

    fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    /// Writes a `u16` length, failing with `operation` if it does not fit.
    fn put_len16(&mut self, len: usize, operation: &'static str) -> Result<()> {
        let len = u16::try_from(len).map_err(|_| Error::Unsupported { operation })?;
        self.put_u16(len);
        Ok(())
    }
}

impl ByteWriter for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }
}

/// Writes a `u16`-length-prefixed modified UTF-8 string.
pub(crate) fn put_utf(out: &mut Vec<u8>, value: &str) -> Result<()> {
    let encoded = crate::mutf8::encode(value);
    out.put_len16(encoded.len(), "encode string longer than 65535 bytes")?;
    out.extend_from_slice(&encoded);
    Ok(())
}
