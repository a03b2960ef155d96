//! Big-endian wire primitives shared by the record and handshake codecs.
//!
//! Every read is bounds-checked; a short buffer is a decode error, never a
//! panic. Composite decoders use [`WireReader::expect_end`] to reject
//! trailing garbage inside length-delimited containers.

use seclink_types::TlsError;

fn truncated(what: &str) -> TlsError {
    TlsError::ProtocolError(format!("truncated input reading {what}"))
}

/// Growable big-endian write buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            buf: Vec::with_capacity(n),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u24(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write `data` with a 1-byte length prefix.
    pub fn put_u8_prefixed(&mut self, data: &[u8]) -> Result<(), TlsError> {
        if data.len() > u8::MAX as usize {
            return Err(TlsError::InternalError("u8 length prefix overflow".into()));
        }
        self.put_u8(data.len() as u8);
        self.put_bytes(data);
        Ok(())
    }

    /// Write `data` with a 2-byte length prefix.
    pub fn put_u16_prefixed(&mut self, data: &[u8]) -> Result<(), TlsError> {
        if data.len() > u16::MAX as usize {
            return Err(TlsError::InternalError("u16 length prefix overflow".into()));
        }
        self.put_u16(data.len() as u16);
        self.put_bytes(data);
        Ok(())
    }

    /// Write `data` with a 3-byte length prefix.
    pub fn put_u24_prefixed(&mut self, data: &[u8]) -> Result<(), TlsError> {
        if data.len() > 0x00FF_FFFF {
            return Err(TlsError::InternalError("u24 length prefix overflow".into()));
        }
        self.put_u24(data.len() as u32);
        self.put_bytes(data);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take `n` raw bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], TlsError> {
        if self.remaining() < n {
            return Err(truncated("bytes"));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn take_u8(&mut self) -> Result<u8, TlsError> {
        let b = self.take(1)?;
        Ok(b[0])
    }

    pub fn take_u16(&mut self) -> Result<u16, TlsError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn take_u24(&mut self) -> Result<u32, TlsError> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn take_u32(&mut self) -> Result<u32, TlsError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Take a run prefixed by a 1-byte length.
    pub fn take_u8_prefixed(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.take_u8()? as usize;
        self.take(n)
    }

    /// Take a run prefixed by a 2-byte length.
    pub fn take_u16_prefixed(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.take_u16()? as usize;
        self.take(n)
    }

    /// Take a run prefixed by a 3-byte length.
    pub fn take_u24_prefixed(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.take_u24()? as usize;
        self.take(n)
    }

    /// Take everything left.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    /// Reject trailing bytes after a complete decode.
    pub fn expect_end(&self) -> Result<(), TlsError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(TlsError::ProtocolError(format!(
                "{} trailing bytes after message",
                self.remaining()
            )))
        }
    }
}
