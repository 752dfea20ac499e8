//! Packet codec and stream framing
//!
//! Packets travel as UTF-8 JSON. On discrete-frame transports (one datagram
//! per packet) the JSON bytes are the whole frame. On raw byte-stream
//! transports (serial modem in transparent mode) each packet is framed as:
//!
//! ```text
//! [ 2 bytes: length (u16, big-endian) ][ N bytes: JSON packet ]
//! ```
//!
//! so message boundaries survive arbitrary read chunking.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tracing::warn;

use crate::{radio, Packet};

/// Hard upper bound for a framed payload. The soft policy limit is
/// [`radio::MAX_FRAME_PAYLOAD`]; this larger bound only guards the framing
/// layer against garbage length prefixes.
pub const MAX_FRAME_LEN: usize = 512;

/// Errors raised while producing wire bytes
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("frame too large for framing layer: {0} bytes (max {MAX_FRAME_LEN})")]
    FrameTooLarge(usize),

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while turning received bytes back into a packet.
///
/// Both kinds keep the offending bytes as a hex string so the consumer can
/// log them; malformed traffic is surfaced, never silently dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Bytes were not valid UTF-8 or not valid JSON
    #[error("malformed encoding ({reason}), raw={raw_hex}")]
    MalformedEncoding { reason: String, raw_hex: String },

    /// Valid JSON that does not have the packet shape
    #[error("invalid packet structure ({reason}), raw={raw_hex}")]
    InvalidStructure { reason: String, raw_hex: String },
}

impl DecodeError {
    /// The hex dump of the bytes that failed to decode
    pub fn raw_hex(&self) -> &str {
        match self {
            DecodeError::MalformedEncoding { raw_hex, .. } => raw_hex,
            DecodeError::InvalidStructure { raw_hex, .. } => raw_hex,
        }
    }
}

/// Render bytes as a lowercase hex string for diagnostics
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Encode a packet to its JSON wire form, checking the default payload limit
pub fn encode(packet: &Packet) -> Result<Bytes, EncodeError> {
    encode_with_limit(packet, radio::MAX_FRAME_PAYLOAD)
}

/// Encode a packet to its JSON wire form.
///
/// Exceeding `payload_limit` logs a warning but still returns the bytes:
/// oversized packets may be dropped or corrupted by the physical link, which
/// is an accepted risk, not a guaranteed failure.
pub fn encode_with_limit(packet: &Packet, payload_limit: usize) -> Result<Bytes, EncodeError> {
    let encoded = serde_json::to_vec(packet)?;

    if encoded.len() > payload_limit {
        warn!(
            "packet {} from {} is {} bytes, over the {} byte radio payload limit",
            packet.kind.code(),
            packet.sender,
            encoded.len(),
            payload_limit
        );
    }

    Ok(Bytes::from(encoded))
}

/// Decode a packet from its JSON wire form.
///
/// Never panics on malformed input; callers receive a tagged error carrying
/// the raw bytes for logging.
pub fn decode(data: &[u8]) -> Result<Packet, DecodeError> {
    match serde_json::from_slice::<Packet>(data) {
        Ok(packet) => Ok(packet),
        Err(e) => {
            let raw_hex = to_hex(data);
            if e.is_data() {
                Err(DecodeError::InvalidStructure {
                    reason: e.to_string(),
                    raw_hex,
                })
            } else {
                Err(DecodeError::MalformedEncoding {
                    reason: e.to_string(),
                    raw_hex,
                })
            }
        }
    }
}

/// Wrap already-encoded payload bytes in a length-prefixed frame
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, EncodeError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(EncodeError::FrameTooLarge(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(2 + payload.len());
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Incremental frame decoder for byte-stream transports.
///
/// Feed it read chunks with [`FrameDecoder::extend`], then drain complete
/// payloads with [`FrameDecoder::next_frame`] until it returns `Ok(None)`.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Add freshly read bytes to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete frame payload.
    ///
    /// Returns `Ok(None)` when more data is needed. A length prefix beyond
    /// [`MAX_FRAME_LEN`] means the stream has lost sync and is unrecoverable.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, DecodeError> {
        if self.buffer.len() < 2 {
            return Ok(None);
        }

        let frame_len = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
        if frame_len > MAX_FRAME_LEN {
            return Err(DecodeError::MalformedEncoding {
                reason: format!("frame length {} exceeds {}", frame_len, MAX_FRAME_LEN),
                raw_hex: to_hex(&self.buffer[..2]),
            });
        }

        if self.buffer.len() < 2 + frame_len {
            return Ok(None);
        }

        self.buffer.advance(2);
        Ok(Some(self.buffer.split_to(frame_len).freeze()))
    }

    /// Bytes currently buffered (for diagnostics)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
