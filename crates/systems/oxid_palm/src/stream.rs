// crates/systems/oxid_palm/src/stream.rs
//! Explicit byte cursors for session records.
//!
//! Every multi-byte field is big endian. Field order is the record layout;
//! there is no tagging or padding, so readers and writers must agree
//! field for field.

use crate::error::StreamError;

pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Default, Clone)]
pub struct StreamWriter {
    buf: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(v as u8)
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// u32 length prefix, then the bytes.
    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.u32(bytes.len() as u32).raw(bytes)
    }

    pub fn str(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes())
    }
}

#[derive(Debug, Clone)]
pub struct StreamReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> StreamResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(StreamError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> StreamResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> StreamResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> StreamResult<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> StreamResult<u16> {
        self.array().map(u16::from_be_bytes)
    }

    pub fn i16(&mut self) -> StreamResult<i16> {
        self.array().map(i16::from_be_bytes)
    }

    pub fn u32(&mut self) -> StreamResult<u32> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn u64(&mut self) -> StreamResult<u64> {
        self.array().map(u64::from_be_bytes)
    }

    pub fn bytes(&mut self) -> StreamResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    pub fn str(&mut self, field: &'static str) -> StreamResult<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| StreamError::InvalidLength { field, len: raw.len() })
    }
}
