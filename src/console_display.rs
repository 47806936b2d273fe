use crate::error::SurfaceError;
use crate::frame_mode::ModeKind;
use crate::input::InputEvent;
use crate::overlay::{EstimateState, OverlayStatus};
use crate::surface::Surface;
use image::RgbImage;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Renders a live ASCII dashboard of the overlay state instead of a window.
/// Takes no input.
pub struct ConsoleDisplay {
    interval: Duration,
    last_draw: Option<Instant>,
    presented: u64,
}

impl ConsoleDisplay {
    pub fn new(update_hz: u32) -> Self {
        let interval = if update_hz == 0 {
            Duration::from_millis(500)
        } else {
            Duration::from_millis((1000 / update_hz as u64).max(1))
        };
        Self {
            interval,
            last_draw: None,
            presented: 0,
        }
    }

    fn due(&mut self) -> bool {
        let now = Instant::now();
        match self.last_draw {
            Some(prev) if now.duration_since(prev) < self.interval => false,
            _ => {
                self.last_draw = Some(now);
                true
            }
        }
    }
}

impl Surface for ConsoleDisplay {
    fn present(&mut self, image: &RgbImage, status: &OverlayStatus) -> Result<(), SurfaceError> {
        self.presented += 1;
        if !self.due() {
            return Ok(());
        }
        let text = dashboard(image.dimensions(), status, self.presented);
        let mut stdout = io::stdout();
        // Clear screen and move cursor home
        write!(stdout, "\x1b[2J\x1b[H{}", text)
            .and_then(|_| stdout.flush())
            .map_err(|e| SurfaceError::Backend(e.to_string()))
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }

    fn is_open(&self) -> bool {
        true
    }
}

fn dashboard(size: (u32, u32), status: &OverlayStatus, presented: u64) -> String {
    let mode = match status.mode {
        ModeKind::Live => "LIVE",
        ModeKind::AutoFrozen => "AUTO-FROZEN",
        ModeKind::Stopped => "STOPPED",
    };
    let selected = status
        .selected
        .map_or_else(|| "none".to_string(), |id| format!("#{}", id));
    let estimate = match status.estimate {
        EstimateState::Available(e) => {
            format!("{:.1} m @ {:.6}, {:.6}", e.distance_m, e.latitude, e.longitude)
        }
        EstimateState::Unavailable(reason) => format!("n/a ({})", reason),
        EstimateState::Stale => "--".to_string(),
    };

    let rows = [
        format!("Mode: {}{}", mode, if status.recording { "  [REC]" } else { "" }),
        format!("Auto-freeze: {}", if status.auto_freeze { "on" } else { "off" }),
        format!("Targets: {:<4} Selected: {}", status.target_count, selected),
        format!("Estimate: {}", estimate),
        format!("Composite: {}x{}  frames: {}", size.0, size.1, presented),
    ];

    let mut out = String::new();
    out.push_str("╔══════════════════════════════════════════════════════════╗\n");
    out.push_str(&format!("║  {:<56}║\n", "TARGET OVERLAY  Live Monitor"));
    out.push_str("╠══════════════════════════════════════════════════════════╣\n");
    for row in rows {
        out.push_str(&format!("║  {:<56}║\n", truncate(&row, 56)));
    }
    out.push_str("╚══════════════════════════════════════════════════════════╝\n");
    out
}

// Truncate by char count to avoid splitting multi-byte chars
fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_rows() {
        let status = OverlayStatus {
            mode: ModeKind::Stopped,
            auto_freeze: true,
            target_count: 3,
            selected: Some(9),
            estimate: EstimateState::Stale,
            recording: true,
        };
        let text = dashboard((940, 480), &status, 12);
        assert!(text.contains("Mode: STOPPED  [REC]"));
        assert!(text.contains("Selected: #9"));
        assert!(text.contains("940x480"));
        assert_eq!(text.lines().count(), 9);
    }

    #[test]
    fn test_refresh_is_throttled() {
        let mut display = ConsoleDisplay::new(1);
        assert!(display.due());
        assert!(!display.due());
    }
}
