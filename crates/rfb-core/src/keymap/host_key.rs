//! Host key identifiers: the keys the host application understands.
//!
//! The host only reacts to a closed set of keys: the 26 letters, space, and a
//! handful of control and navigation keys.  Anything else a viewer sends is a
//! protocol error (see [`crate::keymap::keysym`]).

use serde::{Deserialize, Serialize};

/// A key understood by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostKey {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Space,
    CapsLock,
    Tab,
    Escape,
    Return,
    LeftArrow,
    UpArrow,
    RightArrow,
    DownArrow,
    F1,
}

impl HostKey {
    /// Returns the letter key for an ASCII letter of either case.
    #[cfg(test)]
    pub(crate) fn from_letter(c: char) -> Option<HostKey> {
        const LETTERS: [HostKey; 26] = [
            HostKey::A,
            HostKey::B,
            HostKey::C,
            HostKey::D,
            HostKey::E,
            HostKey::F,
            HostKey::G,
            HostKey::H,
            HostKey::I,
            HostKey::J,
            HostKey::K,
            HostKey::L,
            HostKey::M,
            HostKey::N,
            HostKey::O,
            HostKey::P,
            HostKey::Q,
            HostKey::R,
            HostKey::S,
            HostKey::T,
            HostKey::U,
            HostKey::V,
            HostKey::W,
            HostKey::X,
            HostKey::Y,
            HostKey::Z,
        ];
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() {
            Some(LETTERS[(c as u8 - b'a') as usize])
        } else {
            None
        }
    }
}
