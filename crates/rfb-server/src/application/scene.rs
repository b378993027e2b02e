//! DemoScene: the picture and input handling of the `rfb-server` binary.
//!
//! Eight vertical colour bars scroll one pixel per frame at 60 frames per
//! second.  The scene owns the [`Canvas`] the driver serves to the viewer.
//!
//! | Input | Effect |
//! |---|---|
//! | Return | one-second fade to black, then the bars restart |
//! | Space | pause / resume scrolling |
//! | mouse click | ring the viewer's bell |
//! | Escape | quit |
//!
//! All times are absolute microseconds from the caller's [`Clock`]
//! (see [`crate::application::driver::Clock`]).

use rfb_core::{Canvas, HostKey, InputEvent, Rgb, Transition};

/// One animation frame at 60 Hz.
pub const FRAME_MICROS: u64 = 1_000_000 / 60;

/// Length of the fade started by Return.
pub const FADE_MICROS: u64 = 1_000_000;

const BARS: [Rgb; 8] = [
    Rgb::WHITE,
    Rgb::new(255, 255, 0),
    Rgb::new(0, 255, 255),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 0, 255),
    Rgb::BLACK,
];

/// What the host loop should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneAction {
    Continue,
    RingBell,
    Quit,
}

#[derive(Debug)]
pub struct DemoScene {
    canvas: Canvas,
    offset: u16,
    paused: bool,
    fade_started: Option<u64>,
    next_frame_at: u64,
}

impl DemoScene {
    /// Creates the scene with its first frame already drawn.
    pub fn new(width: u16, height: u16, now: u64) -> Self {
        let mut scene = Self {
            canvas: Canvas::new(width, height),
            offset: 0,
            paused: false,
            fade_started: None,
            next_frame_at: now + FRAME_MICROS,
        };
        scene.render();
        scene
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_fading(&self) -> bool {
        self.fade_started.is_some()
    }

    /// When [`DemoScene::fire_timer`] next wants to run, or `None` if the
    /// scene is static.
    pub fn next_timer(&self) -> Option<u64> {
        if self.paused && self.fade_started.is_none() {
            None
        } else {
            Some(self.next_frame_at)
        }
    }

    /// Advances the animation if its timer is due.  Returns whether the
    /// canvas changed.
    pub fn fire_timer(&mut self, now: u64) -> bool {
        if self.next_timer().map_or(true, |at| now < at) {
            return false;
        }
        self.next_frame_at = now + FRAME_MICROS;

        if let Some(started) = self.fade_started {
            let elapsed = now.saturating_sub(started);
            if elapsed >= FADE_MICROS {
                self.fade_started = None;
                self.canvas.set_transition(None);
                self.offset = 0;
            } else {
                let fraction = elapsed as f64 / FADE_MICROS as f64;
                self.canvas
                    .set_transition(Some(Transition::new(fraction, Rgb::BLACK)));
            }
        }

        if !self.paused {
            self.offset = self.offset.wrapping_add(1) % self.canvas.width().max(1);
        }
        self.render();
        true
    }

    /// Reacts to one input event.
    pub fn handle_event(&mut self, event: &InputEvent, now: u64) -> SceneAction {
        match event {
            InputEvent::KeyDown(HostKey::Escape) => SceneAction::Quit,
            InputEvent::KeyDown(HostKey::Space) => {
                self.paused = !self.paused;
                if !self.paused {
                    self.next_frame_at = now + FRAME_MICROS;
                }
                SceneAction::Continue
            }
            InputEvent::KeyDown(HostKey::Return) => {
                if self.fade_started.is_none() {
                    self.fade_started = Some(now);
                    self.next_frame_at = now + FRAME_MICROS;
                    self.canvas
                        .set_transition(Some(Transition::new(0.0, Rgb::BLACK)));
                }
                SceneAction::Continue
            }
            InputEvent::MouseDown { .. } => SceneAction::RingBell,
            _ => SceneAction::Continue,
        }
    }

    fn render(&mut self) {
        let width = self.canvas.width();
        let height = self.canvas.height();
        for x in 0..width {
            let shifted = (usize::from(x) + usize::from(self.offset)) % usize::from(width);
            let color = BARS[shifted * BARS.len() / usize::from(width)];
            for y in 0..height {
                self.canvas.set_pixel(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfb_core::Point;

    #[test]
    fn test_new_scene_draws_bars_left_to_right() {
        let scene = DemoScene::new(8, 2, 0);
        assert_eq!(scene.canvas().pixel(0, 0), Some(Rgb::WHITE));
        assert_eq!(scene.canvas().pixel(5, 1), Some(Rgb::new(255, 0, 0)));
        assert_eq!(scene.canvas().pixel(7, 0), Some(Rgb::BLACK));
    }

    #[test]
    fn test_timer_scrolls_one_column_per_frame() {
        // Arrange
        let mut scene = DemoScene::new(8, 1, 0);

        // Act
        let changed = scene.fire_timer(FRAME_MICROS);

        // Assert: column 0 now shows what column 1 showed
        assert!(changed);
        assert_eq!(scene.canvas().pixel(0, 0), Some(Rgb::new(255, 255, 0)));
        assert_eq!(scene.next_timer(), Some(2 * FRAME_MICROS));
    }

    #[test]
    fn test_timer_not_due_does_nothing() {
        let mut scene = DemoScene::new(8, 1, 0);
        assert!(!scene.fire_timer(FRAME_MICROS - 1));
        assert_eq!(scene.canvas().pixel(0, 0), Some(Rgb::WHITE));
    }

    #[test]
    fn test_space_pauses_and_removes_timer() {
        let mut scene = DemoScene::new(8, 1, 0);

        let action = scene.handle_event(&InputEvent::KeyDown(HostKey::Space), 10);

        assert_eq!(action, SceneAction::Continue);
        assert!(scene.is_paused());
        assert_eq!(scene.next_timer(), None);
    }

    #[test]
    fn test_return_fades_to_black_over_one_second() {
        // Arrange
        let mut scene = DemoScene::new(8, 1, 0);
        scene.handle_event(&InputEvent::KeyDown(HostKey::Return), 0);

        // Act: halfway
        scene.fire_timer(FADE_MICROS / 2);

        // Assert
        let t = scene.canvas().transition().expect("fade in progress");
        assert!((t.fraction() - 0.5).abs() < 1e-9);
        assert_eq!(t.target(), Rgb::BLACK);

        // Act: past the end
        scene.fire_timer(FADE_MICROS + FRAME_MICROS);

        // Assert
        assert!(!scene.is_fading());
        assert_eq!(scene.canvas().transition(), None);
    }

    #[test]
    fn test_click_rings_bell_and_escape_quits() {
        let mut scene = DemoScene::new(4, 4, 0);
        let click = InputEvent::MouseDown {
            button: 0,
            at: Point::new(1, 1),
        };

        assert_eq!(scene.handle_event(&click, 0), SceneAction::RingBell);
        assert_eq!(
            scene.handle_event(&InputEvent::KeyUp(HostKey::Escape), 0),
            SceneAction::Continue
        );
        assert_eq!(
            scene.handle_event(&InputEvent::KeyDown(HostKey::Escape), 0),
            SceneAction::Quit
        );
    }
}
