//! Application layer of the RFB server.
//!
//! # Sub-modules
//!
//! - **`driver`** – The host-facing facade.  The host loop asks it for the
//!   next input event with a bounded wait, queries button and pointer state,
//!   and reads the 60 Hz tick counter.
//!
//! - **`scene`** – The demo scene rendered by the `rfb-server` binary:
//!   animated colour bars, a fade to black, and key/mouse handling.  It has
//!   no I/O and is driven entirely by the caller's clock.

pub mod driver;
pub mod scene;
