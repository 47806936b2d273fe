//! Native operator window (minifb).
//!
//! The window is opened on the first present, at the size of the first
//! composite, and reopened whenever the composite size changes so that
//! mouse coordinates stay in composite pixels. minifb windows are not `Send`; the control loop that owns this
//! surface must run on the thread that created it.

use crate::error::SurfaceError;
use crate::input::{InputEvent, KeyAction};
use crate::overlay::OverlayStatus;
use crate::surface::Surface;
use image::RgbImage;
use log::info;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

pub struct MinifbSurface {
    window: Option<Window>,
    /// Composite size the open window was created for.
    size: Option<(usize, usize)>,
    buffer: Vec<u32>,
    title: String,
    mouse_was_down: bool,
    closed: bool,
}

impl MinifbSurface {
    pub fn new() -> Self {
        Self {
            window: None,
            size: None,
            buffer: Vec::new(),
            title: String::new(),
            mouse_was_down: false,
            closed: false,
        }
    }

    fn open(&mut self, width: usize, height: usize, title: &str) -> Result<(), SurfaceError> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| SurfaceError::Backend(e.to_string()))?;
        window.set_target_fps(60);
        info!("Operator window opened: {}x{}", width, height);
        self.window = Some(window);
        self.size = Some((width, height));
        self.title = title.to_string();
        self.mouse_was_down = false;
        Ok(())
    }

    fn needs_reopen(&self, width: usize, height: usize) -> bool {
        self.window.is_none() || self.size != Some((width, height))
    }
}

impl Default for MinifbSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for MinifbSurface {
    fn present(&mut self, image: &RgbImage, status: &OverlayStatus) -> Result<(), SurfaceError> {
        if self.closed {
            return Err(SurfaceError::Closed);
        }
        let (w, h) = (image.width() as usize, image.height() as usize);
        let title = status.to_string();
        if self.needs_reopen(w, h) {
            if self.window.take().is_some() {
                info!("Composite size changed to {}x{}, reopening window", w, h);
            }
            self.open(w, h, &title)?;
        }

        self.buffer.clear();
        self.buffer
            .extend(image.pixels().map(|p| (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32));

        let Some(window) = self.window.as_mut() else {
            return Err(SurfaceError::Closed);
        };
        if title != self.title {
            window.set_title(&title);
            self.title = title;
        }
        window
            .update_with_buffer(&self.buffer, w, h)
            .map_err(|e| SurfaceError::Backend(e.to_string()))
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        let Some(window) = self.window.as_ref() else {
            return events;
        };
        if !window.is_open() {
            self.closed = true;
            events.push(InputEvent::Closed);
            return events;
        }

        for key in window.get_keys_pressed(KeyRepeat::No) {
            if let Some(action) = map_key(key) {
                events.push(InputEvent::Key(action));
            }
        }

        let down = window.get_mouse_down(MouseButton::Left);
        if down && !self.mouse_was_down {
            if let Some((x, y)) = window.get_mouse_pos(MouseMode::Discard) {
                events.push(InputEvent::Click { x, y });
            }
        }
        self.mouse_was_down = down;

        if let Some((_, dy)) = window.get_scroll_wheel() {
            if dy != 0.0 {
                events.push(InputEvent::Scroll {
                    ticks: dy.signum() as i32,
                });
            }
        }
        events
    }

    fn is_open(&self) -> bool {
        !self.closed && self.window.as_ref().map_or(true, |w| w.is_open())
    }
}

/// Translate a physical key. Letter keys go through the same character
/// table as typed input.
fn map_key(key: Key) -> Option<KeyAction> {
    let c = match key {
        Key::Escape => return Some(KeyAction::Quit),
        Key::Up => return Some(KeyAction::NavigateUp),
        Key::Down => return Some(KeyAction::NavigateDown),
        Key::Enter | Key::NumPadEnter => return Some(KeyAction::Commit),
        Key::Backspace => return Some(KeyAction::Backspace),
        Key::S => 's',
        Key::F => 'f',
        Key::T => 't',
        Key::G => 'g',
        Key::I => 'i',
        Key::C => 'c',
        Key::R => 'r',
        Key::Key0 | Key::NumPad0 => '0',
        Key::Key1 | Key::NumPad1 => '1',
        Key::Key2 | Key::NumPad2 => '2',
        Key::Key3 | Key::NumPad3 => '3',
        Key::Key4 | Key::NumPad4 => '4',
        Key::Key5 | Key::NumPad5 => '5',
        Key::Key6 | Key::NumPad6 => '6',
        Key::Key7 | Key::NumPad7 => '7',
        Key::Key8 | Key::NumPad8 => '8',
        Key::Key9 | Key::NumPad9 => '9',
        Key::Period | Key::NumPadDot => '.',
        Key::Minus | Key::NumPadMinus => '-',
        _ => return None,
    };
    KeyAction::from_char(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_reopens_on_size_change() {
        let mut surface = MinifbSurface::new();
        assert!(surface.needs_reopen(940, 480), "nothing open yet");
        surface.size = Some((940, 480));
        assert!(surface.needs_reopen(940, 480), "size alone is not an open window");
        assert!(surface.needs_reopen(1100, 600));
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(map_key(Key::S), Some(KeyAction::ToggleStop));
        assert_eq!(map_key(Key::NumPad7), Some(KeyAction::Text('7')));
        assert_eq!(map_key(Key::NumPadDot), Some(KeyAction::Text('.')));
        assert_eq!(map_key(Key::Enter), Some(KeyAction::Commit));
        assert_eq!(map_key(Key::Q), None);
    }
}
