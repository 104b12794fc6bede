//! # Binary Primitives
//!
//! Cursor-based writer and reader for packet payloads.
//!
//! The protocol mixes byte orders per field, so every integer width is offered
//! in both big-endian (the default) and little-endian form. Strings are either
//! fixed-length zero-padded fields or "pascal" strings carrying a 1, 2 or 4
//! byte length prefix. Text is carried as Latin-1: characters above `U+00FF`
//! are written as `?`.
//!
//! ## Seek-back patching
//! Several messages prefix a list with a count that is only known once the
//! list has been written. [`PacketWriter::position`] remembers the slot and
//! [`PacketWriter::patch_u8`] / [`PacketWriter::patch_u16`] fill it in later.
//!
//! ## Size limit
//! The writer never truncates. Writing past the payload limit flags the writer
//! as overflowed ([`PacketWriter::is_overflowed`]) so encoders can split and
//! the transport can refuse the frame.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{ProtocolError, Result};

/// Growable payload writer with a movable cursor
#[derive(Debug, Clone)]
pub struct PacketWriter {
    buf: Vec<u8>,
    pos: usize,
    limit: usize,
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketWriter {
    /// Create a writer bounded by the protocol payload limit
    pub fn new() -> Self {
        Self::with_limit(MAX_PAYLOAD_SIZE)
    }

    /// Create a writer with a custom payload limit
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit.min(256)),
            pos: 0,
            limit,
        }
    }

    /// Number of payload bytes written so far
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current cursor position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the payload limit is reached
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buf.len())
    }

    /// Whether the payload has grown past the limit
    #[inline]
    pub fn is_overflowed(&self) -> bool {
        self.buf.len() > self.limit
    }

    /// Move the cursor to an already-written offset
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(ProtocolError::Custom(format!(
                "seek to {pos} past end of {} written bytes",
                self.buf.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Move the cursor back to the end of the payload
    pub fn seek_end(&mut self) {
        self.pos = self.buf.len();
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn write_u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub fn write_u16(&mut self, v: u16) {
        self.put(&v.to_be_bytes());
    }

    pub fn write_u16_le(&mut self, v: u16) {
        self.put(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.put(&v.to_be_bytes());
    }

    pub fn write_u32_le(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, v: u64) {
        self.put(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.put(bytes);
    }

    /// Append `count` copies of `value`
    pub fn fill(&mut self, value: u8, count: usize) {
        for _ in 0..count {
            self.put(&[value]);
        }
    }

    /// Write a string into a field of exactly `len` bytes, zero padded
    pub fn write_fixed_string(&mut self, s: &str, len: usize) {
        let bytes = encode_latin1(s);
        let n = bytes.len().min(len);
        self.put(&bytes[..n]);
        self.fill(0, len - n);
    }

    /// Write at most `max` bytes of a string with no padding or terminator
    pub fn write_string_max(&mut self, s: &str, max: usize) {
        let bytes = encode_latin1(s);
        let n = bytes.len().min(max);
        self.put(&bytes[..n]);
    }

    /// Write a NUL-terminated string
    pub fn write_cstring(&mut self, s: &str) {
        self.put(&encode_latin1(s));
        self.write_u8(0);
    }

    /// Pascal string with a one byte length prefix (max 255 bytes)
    pub fn write_pascal(&mut self, s: &str) {
        let bytes = encode_latin1(s);
        let n = bytes.len().min(u8::MAX as usize);
        self.write_u8(n as u8);
        self.put(&bytes[..n]);
    }

    /// Pascal string with a little-endian u16 length prefix
    pub fn write_pascal_u16_le(&mut self, s: &str) {
        let bytes = encode_latin1(s);
        let n = bytes.len().min(u16::MAX as usize);
        self.write_u16_le(n as u16);
        self.put(&bytes[..n]);
    }

    /// Pascal string with a little-endian u32 length prefix
    pub fn write_pascal_u32_le(&mut self, s: &str) {
        let bytes = encode_latin1(s);
        self.write_u32_le(bytes.len() as u32);
        self.put(&bytes);
    }

    /// Overwrite a single byte at `pos` without moving the cursor
    pub fn patch_u8(&mut self, pos: usize, v: u8) -> Result<()> {
        let slot = self
            .buf
            .get_mut(pos)
            .ok_or(ProtocolError::Truncated { needed: 1 })?;
        *slot = v;
        Ok(())
    }

    /// Overwrite a big-endian u16 at `pos` without moving the cursor
    pub fn patch_u16(&mut self, pos: usize, v: u16) -> Result<()> {
        if pos + 2 > self.buf.len() {
            return Err(ProtocolError::Truncated {
                needed: pos + 2 - self.buf.len(),
            });
        }
        self.buf[pos..pos + 2].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return the payload
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Forward-only reader over an inbound payload
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated {
                needed: n - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read a fixed-length field, stopping the string at the first NUL
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(decode_latin1(&raw[..end]))
    }

    pub fn read_pascal(&mut self) -> Result<String> {
        let n = self.read_u8()? as usize;
        Ok(decode_latin1(self.take(n)?))
    }

    pub fn read_pascal_u16_le(&mut self) -> Result<String> {
        let n = self.read_u16_le()? as usize;
        Ok(decode_latin1(self.take(n)?))
    }

    /// Read a NUL-terminated string (or the rest of the payload if unterminated)
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let s = decode_latin1(&rest[..end]);
        self.pos += (end + 1).min(rest.len());
        Ok(s)
    }
}

fn encode_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
