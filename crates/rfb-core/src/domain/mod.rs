//! Domain layer: pure input translation and framebuffer encoding.
//!
//! Nothing in here touches a socket.  The server crate feeds decoded records
//! into the [`bridge::EventBridge`] and hands snapshots to
//! [`framebuffer::encode_raw`].

pub mod bridge;
pub mod events;
pub mod framebuffer;
