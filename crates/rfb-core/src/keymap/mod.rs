//! Key code translation from RFB wire keysyms to host keys.
//!
//! Viewers send X11 KeySyms; the host understands [`HostKey`]s.  The mapping
//! is a static table in [`keysym`].

pub mod host_key;
pub mod keysym;

pub use host_key::HostKey;
pub use keysym::{host_to_keysym, keysym_to_host, KEYSYM_TABLE};
