//! Operator input: normalized events, key actions, and the router that
//! applies them to the overlay.
//!
//! Window backends translate their raw key codes and mouse state into
//! [`InputEvent`]s once, at the boundary. Everything past that point works
//! with [`KeyAction`] only.

use crate::layout::{PanelHit, PanelLayout};
use crate::overlay::Overlay;
use crate::telemetry_form::Direction;
use crate::types::Point;
use log::{debug, trace};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    ToggleStop,
    ToggleAutoFreeze,
    ToggleTrails,
    ToggleGrid,
    ToggleInfo,
    ClearSelection,
    ToggleRecording,
    Quit,
    NavigateUp,
    NavigateDown,
    Backspace,
    Commit,
    /// Digit, `.` or `-` for the telemetry editor.
    Text(char),
}

impl KeyAction {
    /// Map a typed character. Hotkeys are matched on both Latin and Russian
    /// (ЙЦУКЕН) layouts so they work regardless of the active keyboard layout.
    pub fn from_char(c: char) -> Option<Self> {
        let lower = c.to_lowercase().next().unwrap_or(c);
        let action = match lower {
            's' | 'ы' => KeyAction::ToggleStop,
            'f' | 'а' => KeyAction::ToggleAutoFreeze,
            't' | 'е' => KeyAction::ToggleTrails,
            'g' | 'п' => KeyAction::ToggleGrid,
            'i' | 'ш' => KeyAction::ToggleInfo,
            'c' | 'с' => KeyAction::ClearSelection,
            'r' | 'к' => KeyAction::ToggleRecording,
            '\u{1b}' => KeyAction::Quit,
            '\r' | '\n' => KeyAction::Commit,
            '\u{8}' | '\u{7f}' => KeyAction::Backspace,
            d if d.is_ascii_digit() || d == '.' || d == '-' => KeyAction::Text(d),
            _ => return None,
        };
        Some(action)
    }

    /// Actions the telemetry editor consumes while a field is focused.
    pub fn is_editing(self) -> bool {
        matches!(
            self,
            KeyAction::Text(_)
                | KeyAction::Backspace
                | KeyAction::Commit
                | KeyAction::NavigateUp
                | KeyAction::NavigateDown
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Primary button press at composite-image coordinates.
    Click { x: f32, y: f32 },
    /// Wheel ticks; positive scrolls up.
    Scroll { ticks: i32 },
    Key(KeyAction),
    /// The window was closed.
    Closed,
}

/// What the control loop has to do after an event was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Ignored,
    ToggleRecording,
    Quit,
}

/// Per-action debounce for global hotkeys.
#[derive(Debug, Clone)]
pub struct KeyCooldown {
    interval: Duration,
    last: HashMap<KeyAction, Instant>,
}

impl KeyCooldown {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: HashMap::new(),
        }
    }

    /// True (and the action is stamped) if `action` last fired at least one
    /// interval before `now`.
    pub fn ready(&mut self, action: KeyAction, now: Instant) -> bool {
        if let Some(&prev) = self.last.get(&action) {
            if now.saturating_duration_since(prev) < self.interval {
                return false;
            }
        }
        self.last.insert(action, now);
        true
    }
}

pub struct InputRouter {
    cooldown: KeyCooldown,
}

impl InputRouter {
    pub fn new(key_cooldown: Duration) -> Self {
        Self {
            cooldown: KeyCooldown::new(key_cooldown),
        }
    }

    /// Apply one event to the overlay.
    ///
    /// `layout` is the panel geometry of the current composite, `None` until
    /// a frame has been shown.
    pub fn dispatch(
        &mut self,
        overlay: &mut Overlay,
        event: InputEvent,
        layout: Option<&PanelLayout>,
        now: Instant,
    ) -> Dispatch {
        trace!("input {:?}", event);
        match event {
            InputEvent::Click { x, y } => self.click(overlay, Point::new(x, y), layout),
            InputEvent::Scroll { ticks } => {
                if overlay.is_stopped() && ticks != 0 {
                    overlay.scroll_form(-ticks);
                    Dispatch::Handled
                } else {
                    Dispatch::Ignored
                }
            }
            InputEvent::Key(action) => self.key(overlay, action, now),
            InputEvent::Closed => Dispatch::Quit,
        }
    }

    fn click(&mut self, overlay: &mut Overlay, p: Point, layout: Option<&PanelLayout>) -> Dispatch {
        if let Some(layout) = layout {
            if layout.contains(p) {
                if !overlay.is_stopped() {
                    return Dispatch::Ignored;
                }
                match layout.hit(p) {
                    Some(PanelHit::ScrollUp) => overlay.scroll_form(-1),
                    Some(PanelHit::ScrollDown) => overlay.scroll_form(1),
                    Some(PanelHit::Row(slot)) => {
                        overlay.activate_slot(slot);
                    }
                    None => {}
                }
                return Dispatch::Handled;
            }
        }
        overlay.select_at(p);
        Dispatch::Handled
    }

    fn key(&mut self, overlay: &mut Overlay, action: KeyAction, now: Instant) -> Dispatch {
        let editing = overlay.is_stopped() && overlay.form().active().is_some();
        if editing {
            return match action {
                KeyAction::Text(c) => {
                    overlay.type_char(c);
                    Dispatch::Handled
                }
                KeyAction::Backspace => {
                    overlay.backspace();
                    Dispatch::Handled
                }
                KeyAction::Commit => {
                    // A rejected value is reported through the overlay notice.
                    let _ = overlay.commit(now);
                    Dispatch::Handled
                }
                KeyAction::NavigateUp => {
                    overlay.navigate(Direction::Up);
                    Dispatch::Handled
                }
                KeyAction::NavigateDown => {
                    overlay.navigate(Direction::Down);
                    Dispatch::Handled
                }
                KeyAction::ToggleStop => {
                    // Leaving stop mode is never debounced.
                    let _ = overlay.toggle_stop(now);
                    Dispatch::Handled
                }
                _ => {
                    debug!("{:?} ignored while editing", action);
                    Dispatch::Ignored
                }
            };
        }

        match action {
            KeyAction::NavigateUp | KeyAction::NavigateDown if overlay.is_stopped() => {
                let direction = if action == KeyAction::NavigateUp {
                    Direction::Up
                } else {
                    Direction::Down
                };
                overlay.navigate(direction);
                Dispatch::Handled
            }
            a if a.is_editing() => Dispatch::Ignored,
            _ => self.global(overlay, action, now),
        }
    }

    fn global(&mut self, overlay: &mut Overlay, action: KeyAction, now: Instant) -> Dispatch {
        if !self.cooldown.ready(action, now) {
            trace!("{:?} within cooldown", action);
            return Dispatch::Ignored;
        }
        match action {
            KeyAction::ToggleStop => {
                // Failure (no frame yet) is surfaced as a notice.
                let _ = overlay.toggle_stop(now);
            }
            KeyAction::ToggleAutoFreeze => {
                overlay.toggle_auto_freeze();
            }
            KeyAction::ToggleTrails => {
                overlay.toggle_trails();
            }
            KeyAction::ToggleGrid => {
                overlay.toggle_grid();
            }
            KeyAction::ToggleInfo => {
                overlay.toggle_info();
            }
            KeyAction::ClearSelection => overlay.clear_selection(),
            KeyAction::ToggleRecording => return Dispatch::ToggleRecording,
            KeyAction::Quit => return Dispatch::Quit,
            _ => return Dispatch::Ignored,
        }
        Dispatch::Handled
    }
}
