//! Primitive wire types.
//!
//! Decoding works against a [`ByteCursor`]: every read advances a working
//! position, and a failed parse attempt rolls back to the last committed
//! checkpoint so that a partially received frame is simply retried once more
//! bytes arrive. Encoding goes through [`PacketBuilder`].

use crate::error::ProtocolError;
use serde_json::json;

/// Longest legal varint encoding.
pub const MAX_VARINT_LEN: usize = 5;

// ============================================================================
// Decoding
// ============================================================================

/// Inbound byte accumulator with checkpoint/restore semantics.
#[derive(Debug, Default, Clone)]
pub struct ByteCursor {
    buf: Vec<u8>,
    /// Working read position
    pos: usize,
    /// Last known-good position
    checkpoint: usize,
}

impl ByteCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already complete payload, such as one frame's contents.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buf: bytes,
            pos: 0,
            checkpoint: 0,
        }
    }

    /// Appends freshly received bytes.
    pub fn add(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Commits the working position and drops the consumed bytes.
    pub fn save(&mut self) {
        self.buf.drain(..self.pos);
        self.pos = 0;
        self.checkpoint = 0;
    }

    /// Rolls the working position back to the last commit.
    pub fn restore(&mut self) {
        self.pos = self.checkpoint;
    }

    /// Bytes available to the working position.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes held, consumed-but-uncommitted ones included.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn read_raw(&mut self, len: usize) -> Result<&[u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::Underrun);
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    /// Everything left after the working position.
    pub fn read_rest(&mut self) -> Vec<u8> {
        let rest = self.buf[self.pos..].to_vec();
        self.pos = self.buf.len();
        rest
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    pub fn read_varint(&mut self) -> Result<i32, ProtocolError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(ProtocolError::VarIntTooLong)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    /// Reads a varint byte-length prefix followed by UTF-8 text.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| ProtocolError::MalformedField(format!("negative string length {}", len)))?;
        let bytes = self.read_raw(len)?.to_vec();
        String::from_utf8(bytes)
            .map_err(|e| ProtocolError::MalformedField(format!("invalid UTF-8 in string: {}", e)))
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Appends the varint encoding of `value` to `out`.
pub fn write_varint(out: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Encoded length of `value` as a varint.
pub fn varint_len(value: i32) -> usize {
    let value = value as u32;
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Builder for a packet body.
///
/// ```rust
/// use gate_server::protocol::PacketBuilder;
///
/// let body = PacketBuilder::new().varint(300).string("hi").bool(true).into_bytes();
/// assert_eq!(body, vec![0xAC, 0x02, 0x02, b'h', b'i', 0x01]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct PacketBuilder {
    buf: Vec<u8>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn varint(mut self, value: i32) -> Self {
        write_varint(&mut self.buf, value);
        self
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub fn i8(self, value: i8) -> Self {
        self.u8(value as u8)
    }

    pub fn bool(self, value: bool) -> Self {
        self.u8(value as u8)
    }

    pub fn u16(mut self, value: u16) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i16(mut self, value: i16) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i32(mut self, value: i32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i64(mut self, value: i64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn f32(mut self, value: f32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn f64(mut self, value: f64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Varint byte-length prefix followed by UTF-8 bytes.
    pub fn string(self, value: &str) -> Self {
        self.varint(value.len() as i32).raw(value.as_bytes())
    }

    /// A chat component `{"text": ...}` encoded as a string.
    pub fn chat(self, text: &str) -> Self {
        let component = json!({ "text": text }).to_string();
        self.string(&component)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
