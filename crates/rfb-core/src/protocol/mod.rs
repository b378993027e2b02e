//! Protocol module containing the RFB message records and their binary codec.

pub mod codec;
pub mod messages;

pub use codec::{encode_to_vec, ProtocolError, WireMessage};
pub use messages::*;
