//! Event Bridge: turns decoded KeyEvent and PointerEvent records into
//! [`InputEvent`]s for the host.
//!
//! # Pointer state machine
//!
//! Only bit 0 of the RFB button mask is observed.  The bridge remembers
//! whether it was set in the previous PointerEvent:
//!
//! ```text
//!            mask bit 0 = 1 / emit MouseDown
//!     ┌────┐ ───────────────────────────────▶ ┌──────┐
//!     │ Up │                                  │ Down │
//!     └────┘ ◀─────────────────────────────── └──────┘
//!            mask bit 0 = 0 / emit MouseUp
//! ```
//!
//! A message that does not change the state emits nothing but still updates
//! the stored pointer position.

use tracing::{debug, trace};

use crate::domain::events::{InputEvent, Point};
use crate::keymap::keysym_to_host;
use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::{KeyEventMessage, PointerEventMessage};

/// Primary-button state as last reported by the viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PointerState {
    #[default]
    Up,
    Down,
}

/// Stateful translator from wire input records to host events.
#[derive(Debug, Default)]
pub struct EventBridge {
    pointer: PointerState,
    position: Point,
}

impl EventBridge {
    /// Creates a bridge with the button up and the pointer at (0, 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Translates a KeyEvent.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownKey`] if the keysym is not in the
    /// static key table.  No state is changed in that case.
    pub fn key_event(&self, msg: &KeyEventMessage) -> Result<InputEvent, ProtocolError> {
        debug!("key 0x{:04X} {}", msg.keysym, if msg.down { "down" } else { "up" });
        let key = keysym_to_host(msg.keysym).ok_or(ProtocolError::UnknownKey(msg.keysym))?;
        Ok(if msg.down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        })
    }

    /// Translates a PointerEvent, returning an event only on a primary-button
    /// transition.  Position and button state are always updated.
    pub fn pointer_event(&mut self, msg: &PointerEventMessage) -> Option<InputEvent> {
        let at = Point::new(i32::from(msg.x), i32::from(msg.y));
        let next = if msg.primary_down() {
            PointerState::Down
        } else {
            PointerState::Up
        };

        let event = match (self.pointer, next) {
            (PointerState::Up, PointerState::Down) => Some(InputEvent::MouseDown { button: 0, at }),
            (PointerState::Down, PointerState::Up) => Some(InputEvent::MouseUp { button: 0, at }),
            _ => None,
        };
        trace!(?at, ?next, "pointer");

        self.pointer = next;
        self.position = at;
        event
    }

    /// Whether the primary button is currently held.
    pub fn button_down(&self) -> bool {
        self.pointer == PointerState::Down
    }

    /// Current primary-button state.
    pub fn pointer_state(&self) -> PointerState {
        self.pointer
    }

    /// Last pointer position reported by the viewer.
    pub fn position(&self) -> Point {
        self.position
    }
}
