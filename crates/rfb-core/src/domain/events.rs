//! Input events produced for the host application.

use serde::{Deserialize, Serialize};

use crate::keymap::HostKey;

/// A pointer position in framebuffer pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An input event translated from a viewer message.
///
/// `button` is always 0, the primary button; other mask bits are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown(HostKey),
    KeyUp(HostKey),
    MouseDown { button: u8, at: Point },
    MouseUp { button: u8, at: Point },
}
