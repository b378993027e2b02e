//! # rfb-core
//!
//! Shared library for the RFB framebuffer server containing the wire codec,
//! the keysym translation table, the input event bridge and the RAW
//! framebuffer encoder.
//!
//! It has no dependencies on sockets or async runtimes; the `rfb-server`
//! crate drives it over a TCP connection.
//!
//! # Architecture overview (for beginners)
//!
//! RFB ("remote framebuffer", the protocol behind VNC) lets a *viewer* watch
//! a *server*'s screen and send keyboard and mouse input back.  This crate
//! holds the parts of a server that are pure data transformation:
//!
//! - **`protocol`** – Every message on the wire as a typed Rust struct, with
//!   exact big-endian encode/decode.
//!
//! - **`keymap`** – The static table mapping X11 KeySyms (what viewers send)
//!   to [`HostKey`]s (what the host application understands).
//!
//! - **`domain`** – The [`EventBridge`] pointer/key state machine and the
//!   framebuffer encoder that serialises the host's pixels, including the
//!   blended frames of a colour transition.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::bridge::{EventBridge, PointerState};
pub use domain::events::{InputEvent, Point};
pub use domain::framebuffer::{
    encode_raw, Canvas, FrameSource, FramebufferError, FramebufferSnapshot, Rgb, Transition,
};
pub use keymap::HostKey;
pub use protocol::codec::{encode_to_vec, ProtocolError, WireMessage};
