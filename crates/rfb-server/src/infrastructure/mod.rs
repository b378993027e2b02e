//! Infrastructure layer for the RFB server.
//!
//! Contains OS-facing adapters: the TCP listener, the handshake, the
//! protocol engine that owns the viewer's socket, and configuration file
//! storage.
//!
//! **Dependency rule**: this layer may depend on `rfb_core`, but MUST NOT
//! import anything from `application`.

pub mod network;
pub mod storage;
