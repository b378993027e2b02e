//! X11 KeySym to [`HostKey`] translation table.
//!
//! RFB KeyEvent messages carry X11 KeySym values (see X11/keysymdef.h).
//! Letters arrive as their lowercase ASCII value; the named keys live in the
//! 0xFFxx range.
//!
//! The table is closed: uppercase letters, digits, modifiers and
//! every other keysym are *not* mapped, and a viewer that sends one fails the
//! session with [`crate::ProtocolError::UnknownKey`].

use super::host_key::HostKey;

/// Every keysym the host understands, paired with its host key.
pub static KEYSYM_TABLE: [(u32, HostKey); 36] = [
    // Letters (X11 lowercase keysyms 0x61-0x7A)
    (0x0061, HostKey::A), // XK_a
    (0x0062, HostKey::B), // XK_b
    (0x0063, HostKey::C), // XK_c
    (0x0064, HostKey::D), // XK_d
    (0x0065, HostKey::E), // XK_e
    (0x0066, HostKey::F), // XK_f
    (0x0067, HostKey::G), // XK_g
    (0x0068, HostKey::H), // XK_h
    (0x0069, HostKey::I), // XK_i
    (0x006A, HostKey::J), // XK_j
    (0x006B, HostKey::K), // XK_k
    (0x006C, HostKey::L), // XK_l
    (0x006D, HostKey::M), // XK_m
    (0x006E, HostKey::N), // XK_n
    (0x006F, HostKey::O), // XK_o
    (0x0070, HostKey::P), // XK_p
    (0x0071, HostKey::Q), // XK_q
    (0x0072, HostKey::R), // XK_r
    (0x0073, HostKey::S), // XK_s
    (0x0074, HostKey::T), // XK_t
    (0x0075, HostKey::U), // XK_u
    (0x0076, HostKey::V), // XK_v
    (0x0077, HostKey::W), // XK_w
    (0x0078, HostKey::X), // XK_x
    (0x0079, HostKey::Y), // XK_y
    (0x007A, HostKey::Z), // XK_z
    (0x0020, HostKey::Space), // XK_space
    // Control keys
    (0xFFE5, HostKey::CapsLock), // XK_Caps_Lock
    (0xFF09, HostKey::Tab),      // XK_Tab
    (0xFF1B, HostKey::Escape),   // XK_Escape
    (0xFF0D, HostKey::Return),   // XK_Return
    // Arrow keys
    (0xFF51, HostKey::LeftArrow),  // XK_Left
    (0xFF52, HostKey::UpArrow),    // XK_Up
    (0xFF53, HostKey::RightArrow), // XK_Right
    (0xFF54, HostKey::DownArrow),  // XK_Down
    // Function keys
    (0xFFBE, HostKey::F1), // XK_F1
];

/// Translates an X11 KeySym to a [`HostKey`].
///
/// Returns `None` if the keysym is not in [`KEYSYM_TABLE`].
pub fn keysym_to_host(keysym: u32) -> Option<HostKey> {
    KEYSYM_TABLE
        .iter()
        .find(|(sym, _)| *sym == keysym)
        .map(|(_, key)| *key)
}

/// Translates a [`HostKey`] back to the keysym a viewer would send for it.
pub fn host_to_keysym(key: HostKey) -> u32 {
    KEYSYM_TABLE
        .iter()
        .find(|(_, k)| *k == key)
        .map(|(sym, _)| *sym)
        .unwrap_or_default()
}
