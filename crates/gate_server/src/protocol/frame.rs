//! Length-delimited frames.
//!
//! Before compression is negotiated a frame is `[length][id][body]`. After
//! the server sends `set_compression` every frame carries a second varint,
//! the uncompressed length: `0` means the rest is plain, anything else means
//! the rest is a zlib stream that must inflate to exactly that many bytes.

use super::codec::{write_varint, ByteCursor};
use crate::error::ProtocolError;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Largest frame accepted from a client (the vanilla three-byte varint limit).
pub const MAX_FRAME_LEN: usize = 2_097_151;

/// Largest inflated payload accepted from a client.
pub const MAX_UNCOMPRESSED_LEN: usize = 8 * 1024 * 1024;

/// One decoded packet: identifier plus undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: i32,
    pub body: Vec<u8>,
}

impl Frame {
    /// A cursor positioned at the start of the body.
    pub fn reader(&self) -> ByteCursor {
        ByteCursor::from_bytes(self.body.clone())
    }
}

/// Frame extraction and construction for one connection.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    compression_threshold: Option<usize>,
}

impl FrameCodec {
    /// A codec in the uncompressed frame format.
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec already in the compressed frame format.
    pub fn with_compression(threshold: usize) -> Self {
        Self {
            compression_threshold: Some(threshold),
        }
    }

    /// Switches both directions to the compressed frame format.
    pub fn enable_compression(&mut self, threshold: usize) {
        self.compression_threshold = Some(threshold);
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        self.compression_threshold
    }

    /// Pulls one complete frame out of `cursor`.
    ///
    /// On [`ProtocolError::Underrun`] the cursor is restored to its last
    /// checkpoint, so nothing is lost; on success the consumed bytes are
    /// committed.
    pub fn extract_frame(&self, cursor: &mut ByteCursor) -> Result<Frame, ProtocolError> {
        let payload = match Self::read_payload(cursor) {
            Ok(payload) => payload,
            Err(e) => {
                cursor.restore();
                return Err(e);
            }
        };
        cursor.save();
        self.decode_payload(payload)
    }

    fn read_payload(cursor: &mut ByteCursor) -> Result<Vec<u8>, ProtocolError> {
        let len = cursor.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| ProtocolError::MalformedField(format!("negative frame length {}", len)))?;
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::MalformedField(format!(
                "frame length {} exceeds {}",
                len, MAX_FRAME_LEN
            )));
        }
        Ok(cursor.read_raw(len)?.to_vec())
    }

    fn decode_payload(&self, payload: Vec<u8>) -> Result<Frame, ProtocolError> {
        let raw = match self.compression_threshold {
            None => payload,
            Some(_) => {
                let mut cursor = ByteCursor::from_bytes(payload);
                let declared = cursor.read_varint().map_err(truncated)?;
                let rest = cursor.read_rest();
                if declared == 0 {
                    rest
                } else {
                    inflate(&rest, declared)?
                }
            }
        };

        let mut cursor = ByteCursor::from_bytes(raw);
        let id = cursor.read_varint().map_err(truncated)?;
        Ok(Frame {
            id,
            body: cursor.read_rest(),
        })
    }

    /// Serializes `id` + `body` into wire bytes.
    pub fn build_frame(&self, id: i32, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let mut raw = Vec::with_capacity(body.len() + 5);
        write_varint(&mut raw, id);
        raw.extend_from_slice(body);

        let inner = match self.compression_threshold {
            None => raw,
            Some(threshold) => {
                let mut inner = Vec::with_capacity(raw.len() + 5);
                if raw.len() >= threshold {
                    write_varint(&mut inner, raw.len() as i32);
                    inner.extend(deflate(&raw)?);
                } else {
                    write_varint(&mut inner, 0);
                    inner.extend(raw);
                }
                inner
            }
        };

        let mut frame = Vec::with_capacity(inner.len() + 5);
        write_varint(&mut frame, inner.len() as i32);
        frame.extend(inner);
        Ok(frame)
    }
}

/// Inside a complete frame there is nothing more to wait for.
fn truncated(err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::Underrun => ProtocolError::MalformedField("truncated frame".to_string()),
        other => other,
    }
}

fn inflate(data: &[u8], declared: i32) -> Result<Vec<u8>, ProtocolError> {
    let expected = usize::try_from(declared).map_err(|_| {
        ProtocolError::MalformedField(format!("negative uncompressed length {}", declared))
    })?;
    if expected > MAX_UNCOMPRESSED_LEN {
        return Err(ProtocolError::MalformedField(format!(
            "uncompressed length {} exceeds {}",
            expected, MAX_UNCOMPRESSED_LEN
        )));
    }

    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(data)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ProtocolError::MalformedField(format!("zlib: {}", e)))?;

    if out.len() != expected {
        return Err(ProtocolError::MalformedField(format!(
            "decompressed {} bytes, expected {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ProtocolError::MalformedField(format!("zlib: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ProtocolError::MalformedField(format!("zlib: {}", e)))
}
