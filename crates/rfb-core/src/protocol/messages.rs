//! All RFB 3.8 message records handled by the server.
//!
//! Each struct here is the *body* of one message.  The 1-byte message-type tag
//! that precedes client-to-server and server-to-client messages is read and
//! written by the caller, never by the record itself; see
//! [`ClientMessageType`] and [`ServerMessageType`].
//!
//! # Wire layouts (for beginners)
//!
//! RFB is a very old protocol and every message has a fixed layout of
//! big-endian integers, sometimes followed by a variable-length tail whose
//! size is declared inside the fixed part.  For example `SetEncodings`:
//!
//! ```text
//! [type:1=2][reserved:1][count:2][encoding:4 × count]
//!           └──────── record ───────────────────────┘
//! ```
//!
//! Reserved bytes are zero on the wire and carry no information, so they have
//! no field in the Rust structs.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// The only protocol version this server speaks.
pub const PROTOCOL_VERSION: [u8; 12] = *b"RFB 003.008\n";

/// Security type "None": no authentication, no encryption.
pub const SECURITY_TYPE_NONE: u8 = 0x01;

/// `SecurityResult` status meaning the handshake may continue.
pub const SECURITY_RESULT_OK: u32 = 0;

/// Encoding identifier for uncompressed pixels, the only one produced.
pub const ENCODING_RAW: i32 = 0;

/// Bytes per pixel in the fixed server pixel format.
pub const BYTES_PER_PIXEL: usize = 4;

// ── Message type tags ─────────────────────────────────────────────────────────

/// Tags of the messages a viewer may send after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClientMessageType {
    SetPixelFormat = 0,
    SetEncodings = 2,
    FramebufferUpdateRequest = 3,
    KeyEvent = 4,
    PointerEvent = 5,
    ClientCutText = 6,
}

impl TryFrom<u8> for ClientMessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(ClientMessageType::SetPixelFormat),
            2 => Ok(ClientMessageType::SetEncodings),
            3 => Ok(ClientMessageType::FramebufferUpdateRequest),
            4 => Ok(ClientMessageType::KeyEvent),
            5 => Ok(ClientMessageType::PointerEvent),
            6 => Ok(ClientMessageType::ClientCutText),
            _ => Err(()),
        }
    }
}

/// Tags of the messages the server sends after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServerMessageType {
    FramebufferUpdate = 0,
    Bell = 2,
    ServerCutText = 3,
}

// ── Handshake records ─────────────────────────────────────────────────────────

/// ProtocolVersion: 12 ASCII bytes, sent by both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersionMessage {
    pub version: [u8; 12],
}

impl Default for ProtocolVersionMessage {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
        }
    }
}

/// SecurityList: the security types offered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityListMessage {
    pub types: Vec<u8>,
}

/// SecurityChoice: the type picked by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityChoiceMessage {
    pub security_type: u8,
}

/// SecurityResult: 0 means OK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityResultMessage {
    pub status: u32,
}

/// ClientInit: the shared-desktop flag, which this server ignores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInitMessage {
    pub shared: u8,
}

/// Pixel layout description embedded in ServerInit and SetPixelFormat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: u8,
    pub true_color: u8,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// The only format the server ever produces: 32 bpp, 24-bit depth,
    /// big-endian true colour with 8 bits per channel.
    pub const fn server_default() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: 1,
            true_color: 1,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 8,
            green_shift: 16,
            blue_shift: 24,
        }
    }
}

/// ServerInit: framebuffer size, pixel format and desktop name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInitMessage {
    pub width: u16,
    pub height: u16,
    pub format: PixelFormat,
    /// Desktop name; sent as raw bytes with a 4-byte length prefix.
    pub name: Vec<u8>,
}

// ── Client-to-server records ──────────────────────────────────────────────────

/// SetPixelFormat (0): accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPixelFormatMessage {
    pub format: PixelFormat,
}

/// SetEncodings (2): accepted and ignored; RAW is always used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetEncodingsMessage {
    pub encodings: Vec<i32>,
}

/// FramebufferUpdateRequest (3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramebufferUpdateRequestMessage {
    pub incremental: bool,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// KeyEvent (4): `keysym` is an X11 KeySym value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEventMessage {
    pub down: bool,
    pub keysym: u32,
}

/// PointerEvent (5): bit 0 of `button_mask` is the primary button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEventMessage {
    pub button_mask: u8,
    pub x: u16,
    pub y: u16,
}

impl PointerEventMessage {
    /// Whether the primary (left) button is held.
    pub fn primary_down(&self) -> bool {
        self.button_mask & 0x01 != 0
    }
}

/// ClientCutText (6): clipboard text pushed by the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCutTextMessage {
    pub text: Vec<u8>,
}

// ── Server-to-client records ──────────────────────────────────────────────────

/// FramebufferUpdate (0) header; the rectangles follow it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramebufferUpdateMessage {
    pub rect_count: u16,
}

/// Rectangle header inside a FramebufferUpdate; its payload follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectangleHeader {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: i32,
}

impl RectangleHeader {
    /// A RAW rectangle covering a whole `width` × `height` framebuffer.
    pub fn full_frame(width: u16, height: u16) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            encoding: ENCODING_RAW,
        }
    }
}

/// ServerCutText (3): clipboard text pushed to the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCutTextMessage {
    pub text: Vec<u8>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
