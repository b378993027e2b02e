//! Binary codec for the RFB message records.
//!
//! Every record implements [`WireMessage`]: a fixed-length prefix, an optional
//! tail whose length is declared inside the prefix, and symmetric
//! `encode`/`decode`.  All multi-byte integers are big-endian.  Reserved bytes
//! are written as zero and skipped when reading.
//!
//! The message-type tag is **not** part of any record.  A stream reader first
//! reads the tag, then `FIXED_LEN` bytes, asks [`WireMessage::trailing_len`]
//! how much more to read, and finally calls [`WireMessage::decode`] on the
//! concatenation.

use crate::protocol::messages::{
    ClientCutTextMessage, ClientInitMessage, FramebufferUpdateMessage,
    FramebufferUpdateRequestMessage, KeyEventMessage, PixelFormat, PointerEventMessage,
    ProtocolVersionMessage, RectangleHeader, SecurityChoiceMessage, SecurityListMessage,
    SecurityResultMessage, ServerCutTextMessage, ServerInitMessage, SetEncodingsMessage,
    SetPixelFormatMessage,
};
use thiserror::Error;

/// Errors raised while decoding records or validating the handshake.
///
/// Every variant is fatal for the session that produced it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the record requires.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The viewer answered with a protocol version other than ours.
    #[error("protocol version mismatch: client sent {received:?}")]
    VersionMismatch { received: String },

    /// The viewer chose a security type that was not offered.
    #[error("security type {0} rejected; only None (1) is offered")]
    SecurityRejected(u8),

    /// The message-type tag is not one of the supported client messages.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// A KeyEvent carried a keysym that has no host key.
    #[error("unknown key code: 0x{0:04X}")]
    UnknownKey(u32),

    /// A declared tail length is larger than the configured limit.
    #[error("{field} declares {declared} bytes, limit is {limit}")]
    LengthLimitExceeded {
        field: &'static str,
        declared: usize,
        limit: usize,
    },

    /// The host's frame is not the size announced in ServerInit.
    #[error("frame is {actual_width}x{actual_height}, announced {width}x{height}")]
    FramebufferSizeMismatch {
        width: u16,
        height: u16,
        actual_width: u16,
        actual_height: u16,
    },
}

/// A fixed-layout RFB record.
pub trait WireMessage: Sized {
    /// Length in bytes of the fixed prefix.
    const FIXED_LEN: usize;

    /// Number of bytes that follow the fixed prefix, as declared by `prefix`.
    ///
    /// `prefix` must be exactly [`Self::FIXED_LEN`] bytes long.
    fn trailing_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
        let _ = prefix;
        Ok(0)
    }

    /// Appends the encoded record to `buf`.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Decodes a record from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InsufficientData`] if `bytes` is shorter than
    /// the prefix plus its declared tail.
    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError>;
}

/// Encodes `msg` into a fresh byte vector.
///
/// # Examples
///
/// ```rust
/// use rfb_core::protocol::codec::{encode_to_vec, WireMessage};
/// use rfb_core::protocol::messages::PointerEventMessage;
///
/// let msg = PointerEventMessage { button_mask: 1, x: 10, y: 20 };
/// let bytes = encode_to_vec(&msg);
/// assert_eq!(bytes, [1, 0, 10, 0, 20]);
/// assert_eq!(PointerEventMessage::decode(&bytes).unwrap(), msg);
/// ```
pub fn encode_to_vec<M: WireMessage>(msg: &M) -> Vec<u8> {
    let mut buf = Vec::with_capacity(M::FIXED_LEN);
    msg.encode(&mut buf);
    buf
}

// ── Handshake records ─────────────────────────────────────────────────────────

impl WireMessage for ProtocolVersionMessage {
    const FIXED_LEN: usize = 12;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.version);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        let mut version = [0u8; 12];
        version.copy_from_slice(&p[..12]);
        Ok(Self { version })
    }
}

impl WireMessage for SecurityListMessage {
    const FIXED_LEN: usize = 1;

    fn trailing_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
        require_len(prefix, Self::FIXED_LEN)?;
        Ok(prefix[0] as usize)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        let count = self.types.len().min(u8::MAX as usize);
        buf.push(count as u8);
        buf.extend_from_slice(&self.types[..count]);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        let count = Self::trailing_len(p)?;
        require_len(p, 1 + count)?;
        Ok(Self {
            types: p[1..1 + count].to_vec(),
        })
    }
}

impl WireMessage for SecurityChoiceMessage {
    const FIXED_LEN: usize = 1;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.security_type);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        Ok(Self {
            security_type: p[0],
        })
    }
}

impl WireMessage for SecurityResultMessage {
    const FIXED_LEN: usize = 4;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.status.to_be_bytes());
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            status: read_u32(p, 0)?,
        })
    }
}

impl WireMessage for ClientInitMessage {
    const FIXED_LEN: usize = 1;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.shared);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        Ok(Self { shared: p[0] })
    }
}

impl WireMessage for PixelFormat {
    const FIXED_LEN: usize = 16;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.bits_per_pixel);
        buf.push(self.depth);
        buf.push(self.big_endian);
        buf.push(self.true_color);
        buf.extend_from_slice(&self.red_max.to_be_bytes());
        buf.extend_from_slice(&self.green_max.to_be_bytes());
        buf.extend_from_slice(&self.blue_max.to_be_bytes());
        buf.push(self.red_shift);
        buf.push(self.green_shift);
        buf.push(self.blue_shift);
        buf.extend_from_slice(&[0u8; 3]); // reserved
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        Ok(Self {
            bits_per_pixel: p[0],
            depth: p[1],
            big_endian: p[2],
            true_color: p[3],
            red_max: read_u16(p, 4)?,
            green_max: read_u16(p, 6)?,
            blue_max: read_u16(p, 8)?,
            red_shift: p[10],
            green_shift: p[11],
            blue_shift: p[12],
            // p[13..16] reserved
        })
    }
}

impl WireMessage for ServerInitMessage {
    // width (2) + height (2) + pixel format (16) + name length (4)
    const FIXED_LEN: usize = 24;

    fn trailing_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
        Ok(read_u32(prefix, 20)? as usize)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.width.to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        self.format.encode(buf);
        buf.extend_from_slice(&(self.name.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.name);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        let name_len = Self::trailing_len(p)?;
        require_len(p, Self::FIXED_LEN + name_len)?;
        Ok(Self {
            width: read_u16(p, 0)?,
            height: read_u16(p, 2)?,
            format: PixelFormat::decode(&p[4..20])?,
            name: p[24..24 + name_len].to_vec(),
        })
    }
}

// ── Client-to-server records ──────────────────────────────────────────────────

impl WireMessage for SetPixelFormatMessage {
    const FIXED_LEN: usize = 3 + PixelFormat::FIXED_LEN;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[0u8; 3]); // reserved
        self.format.encode(buf);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        Ok(Self {
            format: PixelFormat::decode(&p[3..])?,
        })
    }
}

impl WireMessage for SetEncodingsMessage {
    const FIXED_LEN: usize = 3;

    fn trailing_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
        Ok(read_u16(prefix, 1)? as usize * 4)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        let count = self.encodings.len().min(u16::MAX as usize);
        buf.push(0x00); // reserved
        buf.extend_from_slice(&(count as u16).to_be_bytes());
        for encoding in &self.encodings[..count] {
            buf.extend_from_slice(&encoding.to_be_bytes());
        }
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        let tail = Self::trailing_len(p)?;
        require_len(p, Self::FIXED_LEN + tail)?;
        let encodings = p[Self::FIXED_LEN..Self::FIXED_LEN + tail]
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { encodings })
    }
}

impl WireMessage for FramebufferUpdateRequestMessage {
    const FIXED_LEN: usize = 9;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(self.incremental));
        buf.extend_from_slice(&self.x.to_be_bytes());
        buf.extend_from_slice(&self.y.to_be_bytes());
        buf.extend_from_slice(&self.width.to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        Ok(Self {
            incremental: p[0] != 0,
            x: read_u16(p, 1)?,
            y: read_u16(p, 3)?,
            width: read_u16(p, 5)?,
            height: read_u16(p, 7)?,
        })
    }
}

impl WireMessage for KeyEventMessage {
    const FIXED_LEN: usize = 7;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(self.down));
        buf.extend_from_slice(&[0u8; 2]); // reserved
        buf.extend_from_slice(&self.keysym.to_be_bytes());
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        Ok(Self {
            down: p[0] != 0,
            keysym: read_u32(p, 3)?,
        })
    }
}

impl WireMessage for PointerEventMessage {
    const FIXED_LEN: usize = 5;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.button_mask);
        buf.extend_from_slice(&self.x.to_be_bytes());
        buf.extend_from_slice(&self.y.to_be_bytes());
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        Ok(Self {
            button_mask: p[0],
            x: read_u16(p, 1)?,
            y: read_u16(p, 3)?,
        })
    }
}

impl WireMessage for ClientCutTextMessage {
    const FIXED_LEN: usize = 7;

    fn trailing_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
        Ok(read_u32(prefix, 3)? as usize)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        encode_cut_text(buf, &self.text);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            text: decode_cut_text(p, Self::trailing_len(p)?)?,
        })
    }
}

// ── Server-to-client records ──────────────────────────────────────────────────

impl WireMessage for FramebufferUpdateMessage {
    const FIXED_LEN: usize = 3;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(0x00); // padding
        buf.extend_from_slice(&self.rect_count.to_be_bytes());
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            rect_count: read_u16(p, 1)?,
        })
    }
}

impl WireMessage for RectangleHeader {
    const FIXED_LEN: usize = 12;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.x.to_be_bytes());
        buf.extend_from_slice(&self.y.to_be_bytes());
        buf.extend_from_slice(&self.width.to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.encoding.to_be_bytes());
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, Self::FIXED_LEN)?;
        Ok(Self {
            x: read_u16(p, 0)?,
            y: read_u16(p, 2)?,
            width: read_u16(p, 4)?,
            height: read_u16(p, 6)?,
            encoding: read_u32(p, 8)? as i32,
        })
    }
}

impl WireMessage for ServerCutTextMessage {
    const FIXED_LEN: usize = 7;

    fn trailing_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
        Ok(read_u32(prefix, 3)? as usize)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        encode_cut_text(buf, &self.text);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            text: decode_cut_text(p, Self::trailing_len(p)?)?,
        })
    }
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn encode_cut_text(buf: &mut Vec<u8>, text: &[u8]) {
    buf.extend_from_slice(&[0u8; 3]); // reserved
    buf.extend_from_slice(&(text.len() as u32).to_be_bytes());
    buf.extend_from_slice(text);
}

fn decode_cut_text(p: &[u8], len: usize) -> Result<Vec<u8>, ProtocolError> {
    require_len(p, 7 + len)?;
    Ok(p[7..7 + len].to_vec())
}

fn require_len(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::InsufficientData {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ProtocolError> {
    require_len(buf, offset + 2)?;
    Ok(u16::from_be_bytes([buf[offset], buf[offset + 1]]))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    require_len(buf, offset + 4)?;
    Ok(u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
