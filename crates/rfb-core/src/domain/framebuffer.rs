//! Framebuffer snapshots and the RAW pixel encoder.
//!
//! The host owns its pixel buffer.  Each time a viewer asks for an update the
//! server takes a read-only [`FramebufferSnapshot`] from a [`FrameSource`] and
//! serialises it with [`encode_raw`].
//!
//! # Pixel layout
//!
//! Pixels are 4 bytes, `[pad, red, green, blue]`, row-major with no row
//! padding.  This is the host buffer's own layout and it goes out as-is; it
//! is not derived from the shifts advertised in ServerInit, under which byte
//! 0 of a big-endian pixel would be blue.  Blended pixels keep the same
//! layout with the padding byte first.
//!
//! # Transitions
//!
//! While the host is cross-fading to a flat colour it attaches a
//! [`Transition`].  Every channel is then blended as
//! `round(target * f + source * (1 - f))`.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::messages::BYTES_PER_PIXEL;

/// Errors raised when building a snapshot from host data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FramebufferError {
    /// The pixel slice does not hold exactly `width * height * 4` bytes.
    #[error("pixel buffer for {width}x{height} must be {expected} bytes, got {actual}")]
    SizeMismatch {
        width: u16,
        height: u16,
        expected: usize,
        actual: usize,
    },
}

/// An opaque 24-bit colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// A cross-fade from the rendered frame toward a flat colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    fraction: f64,
    target: Rgb,
}

impl Transition {
    /// Creates a transition; `fraction` is clamped to `[0, 1]` and NaN is
    /// treated as 0.
    pub fn new(fraction: f64, target: Rgb) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        Self { fraction, target }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn target(&self) -> Rgb {
        self.target
    }
}

/// Read-only view of the host's current frame.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferSnapshot<'a> {
    width: u16,
    height: u16,
    pixels: &'a [u8],
    transition: Option<Transition>,
}

impl<'a> FramebufferSnapshot<'a> {
    /// Wraps a `width` × `height` pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FramebufferError::SizeMismatch`] unless `pixels` holds
    /// exactly `width * height * 4` bytes.
    pub fn new(width: u16, height: u16, pixels: &'a [u8]) -> Result<Self, FramebufferError> {
        let expected = frame_len(width, height);
        if pixels.len() != expected {
            return Err(FramebufferError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            transition: None,
        })
    }

    /// Attaches (or clears) a transition.
    pub fn with_transition(mut self, transition: Option<Transition>) -> Self {
        self.transition = transition;
        self
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    pub fn transition(&self) -> Option<Transition> {
        self.transition
    }
}

/// Anything that can hand out the current frame.
pub trait FrameSource {
    /// Returns a view of the most recently rendered frame.
    fn snapshot(&self) -> FramebufferSnapshot<'_>;
}

/// Number of bytes in a `width` × `height` frame.
pub fn frame_len(width: u16, height: u16) -> usize {
    usize::from(width) * usize::from(height) * BYTES_PER_PIXEL
}

/// Blends one channel toward `target` by `fraction`, rounding to nearest.
pub fn blend_channel(source: u8, target: u8, fraction: f64) -> u8 {
    let value = f64::from(target) * fraction + f64::from(source) * (1.0 - fraction);
    value.round() as u8
}

/// Serialises `snapshot` as a RAW rectangle payload.
///
/// Without a transition, or with a fraction of exactly zero, the host's bytes
/// are returned as-is without copying.
///
/// # Examples
///
/// ```rust
/// use rfb_core::domain::framebuffer::{encode_raw, FramebufferSnapshot, Rgb, Transition};
///
/// let pixels = [0, 100, 100, 100];
/// let snap = FramebufferSnapshot::new(1, 1, &pixels)
///     .unwrap()
///     .with_transition(Some(Transition::new(0.5, Rgb::new(200, 200, 200))));
/// assert_eq!(&*encode_raw(&snap), &[0, 150, 150, 150]);
/// ```
pub fn encode_raw<'a>(snapshot: &FramebufferSnapshot<'a>) -> Cow<'a, [u8]> {
    let transition = match snapshot.transition {
        Some(t) if t.fraction != 0.0 => t,
        _ => return Cow::Borrowed(snapshot.pixels),
    };

    let f = transition.fraction;
    let to = transition.target;
    let mut out = Vec::with_capacity(snapshot.pixels.len());
    for px in snapshot.pixels.chunks_exact(BYTES_PER_PIXEL) {
        out.push(0x00); // padding
        out.push(blend_channel(px[1], to.red, f));
        out.push(blend_channel(px[2], to.green, f));
        out.push(blend_channel(px[3], to.blue, f));
    }
    Cow::Owned(out)
}

/// An owned host-side pixel buffer.
///
/// Convenient for hosts that render in software; it implements
/// [`FrameSource`] directly.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
    transition: Option<Transition>,
}

impl Canvas {
    /// Creates a black canvas.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; frame_len(width, height)],
            transition: None,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Paints every pixel with `color`.
    pub fn fill(&mut self, color: Rgb) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&[0, color.red, color.green, color.blue]);
        }
    }

    /// Paints one pixel; out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: u16, y: u16, color: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let off = (usize::from(y) * usize::from(self.width) + usize::from(x)) * BYTES_PER_PIXEL;
        self.pixels[off..off + BYTES_PER_PIXEL]
            .copy_from_slice(&[0, color.red, color.green, color.blue]);
    }

    /// Reads one pixel.
    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let off = (usize::from(y) * usize::from(self.width) + usize::from(x)) * BYTES_PER_PIXEL;
        Some(Rgb::new(
            self.pixels[off + 1],
            self.pixels[off + 2],
            self.pixels[off + 3],
        ))
    }

    pub fn set_transition(&mut self, transition: Option<Transition>) {
        self.transition = transition;
    }

    pub fn transition(&self) -> Option<Transition> {
        self.transition
    }
}

impl FrameSource for Canvas {
    fn snapshot(&self) -> FramebufferSnapshot<'_> {
        FramebufferSnapshot {
            width: self.width,
            height: self.height,
            pixels: &self.pixels,
            transition: self.transition,
        }
    }
}
