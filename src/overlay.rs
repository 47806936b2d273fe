//! The overlay controller: one owned object holding everything the operator
//! can see or change. The input router mutates it, the renderer reads it.

use crate::config::OverlayConfig;
use crate::error::{FormError, ModeError};
use crate::frame_mode::{FrameModeController, Ingest, ModeKind, StopToggle};
use crate::geo::{self, CameraFov, TargetEstimate, Unavailable};
use crate::telemetry_form::{CommitOutcome, Direction, TelemetryForm};
use crate::track_store::TrackStore;
use crate::types::{Delivery, Point};
use log::{debug, info, warn};
use std::fmt;
use std::time::{Duration, Instant};

/// Geolocation result for the selected target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EstimateState {
    /// Selection or telemetry changed since the last computation.
    Stale,
    Available(TargetEstimate),
    Unavailable(Unavailable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayToggles {
    pub trails: bool,
    pub grid: bool,
    pub info: bool,
}

#[derive(Debug, Clone)]
struct Notice {
    text: String,
    expires_at: Instant,
}

/// Snapshot of the overlay for window titles and console output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStatus {
    pub mode: ModeKind,
    pub auto_freeze: bool,
    pub target_count: usize,
    pub selected: Option<u64>,
    pub estimate: EstimateState,
    pub recording: bool,
}

impl fmt::Display for OverlayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            ModeKind::Live => "LIVE",
            ModeKind::AutoFrozen => "FROZEN",
            ModeKind::Stopped => "STOPPED",
        };
        write!(f, "Target Overlay | {} | targets {}", mode, self.target_count)?;
        if let Some(id) = self.selected {
            write!(f, " | selected #{}", id)?;
        }
        if self.auto_freeze {
            f.write_str(" | auto-freeze")?;
        }
        if self.recording {
            f.write_str(" | REC")?;
        }
        Ok(())
    }
}

pub struct Overlay {
    modes: FrameModeController,
    tracks: TrackStore,
    form: TelemetryForm,
    estimate: EstimateState,
    toggles: DisplayToggles,
    fov: CameraFov,
    select_radius: f32,
    notice: Option<Notice>,
    notice_duration: Duration,
    deliveries: u64,
}

impl Overlay {
    pub fn new(config: &OverlayConfig) -> Self {
        let mut modes = FrameModeController::new();
        modes.set_auto_freeze(config.auto_freeze);
        Self {
            modes,
            tracks: TrackStore::new(
                config.track_history_capacity,
                config.selection_history_capacity,
            ),
            form: TelemetryForm::new(config.visible_fields),
            estimate: EstimateState::Stale,
            toggles: DisplayToggles {
                trails: config.show_trails,
                grid: config.show_grid,
                info: config.show_info,
            },
            fov: config.fov(),
            select_radius: config.select_radius_px,
            notice: None,
            notice_duration: config.notice_duration(),
            deliveries: 0,
        }
    }

    // ─── Frames ─────────────────────────────────────────────────────────

    /// Feed one queue delivery taken at `now_secs` on the session clock.
    /// Track history only sees deliveries that became effective.
    pub fn ingest(&mut self, delivery: Delivery, now_secs: f64) -> Ingest {
        self.deliveries += 1;
        let outcome = self.modes.ingest(delivery);
        if outcome == Ingest::Shown {
            if let Some(effective) = self.modes.effective() {
                self.tracks.observe(&effective.results, now_secs);
            }
        }
        outcome
    }

    pub fn effective(&self) -> Option<&Delivery> {
        self.modes.effective()
    }

    pub fn mode(&self) -> ModeKind {
        self.modes.kind()
    }

    pub fn is_stopped(&self) -> bool {
        self.modes.is_stopped()
    }

    pub fn auto_freeze(&self) -> bool {
        self.modes.auto_freeze()
    }

    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }

    pub fn form(&self) -> &TelemetryForm {
        &self.form
    }

    pub fn estimate(&self) -> EstimateState {
        self.estimate
    }

    pub fn toggles(&self) -> DisplayToggles {
        self.toggles
    }

    pub fn fov(&self) -> CameraFov {
        self.fov
    }

    pub fn status(&self, recording: bool) -> OverlayStatus {
        OverlayStatus {
            mode: self.mode(),
            auto_freeze: self.auto_freeze(),
            target_count: self.effective().map_or(0, |d| d.results.len()),
            selected: self.tracks.selected(),
            estimate: self.estimate,
            recording,
        }
    }

    // ─── Mode toggles ───────────────────────────────────────────────────

    /// Enter or leave stop mode.
    ///
    /// Entering focuses the first telemetry field. Leaving drops focus and,
    /// with a target selected, geolocates it against the frame that was
    /// frozen on screen.
    pub fn toggle_stop(&mut self, now: Instant) -> Result<ModeKind, ModeError> {
        match self.modes.toggle_stop() {
            Ok(StopToggle::Entered) => {
                self.form.activate_first();
                info!("Stop mode ON: frame frozen");
                info!("  Enter drone latitude, longitude, altitude, compass and camera pitch");
                info!("  Up/Down or click to move between fields, Enter to confirm, S to resume");
                Ok(ModeKind::Stopped)
            }
            Ok(StopToggle::Exited { snapshot }) => {
                self.form.deactivate();
                info!("Stop mode OFF: resuming live view");
                if self.tracks.selected().is_some() {
                    self.estimate_against(&snapshot);
                }
                Ok(self.modes.kind())
            }
            Err(e) => {
                warn!("Cannot enter stop mode: {}", e);
                self.show_notice(e.to_string(), now);
                Err(e)
            }
        }
    }

    pub fn toggle_auto_freeze(&mut self) -> bool {
        let on = self.modes.toggle_auto_freeze();
        info!("Auto-freeze {}", if on { "enabled" } else { "disabled" });
        on
    }

    pub fn toggle_trails(&mut self) -> bool {
        self.toggles.trails = !self.toggles.trails;
        self.toggles.trails
    }

    pub fn toggle_grid(&mut self) -> bool {
        self.toggles.grid = !self.toggles.grid;
        self.toggles.grid
    }

    pub fn toggle_info(&mut self) -> bool {
        self.toggles.info = !self.toggles.info;
        self.toggles.info
    }

    // ─── Selection ──────────────────────────────────────────────────────

    /// Select the effective target whose center is nearest to `point` and
    /// closer than the select radius. A miss clears the selection.
    pub fn select_at(&mut self, point: Point) -> Option<u64> {
        let nearest = self.effective().and_then(|d| {
            d.results
                .iter()
                .map(|r| (r.track_id, r.bbox.center().distance_to(point)))
                .filter(|&(_, dist)| dist < self.select_radius)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id)
        });
        match nearest {
            Some(id) => info!("Target {} selected", id),
            None => debug!("click at ({:.0}, {:.0}) hit no target", point.x, point.y),
        }
        self.set_selection(nearest);
        nearest
    }

    pub fn clear_selection(&mut self) {
        if self.tracks.selected().is_some() {
            info!("Selection cleared");
        }
        self.set_selection(None);
    }

    fn set_selection(&mut self, track_id: Option<u64>) {
        if self.tracks.select(track_id) {
            self.estimate = EstimateState::Stale;
        }
    }

    // ─── Telemetry editing ──────────────────────────────────────────────

    pub fn type_char(&mut self, c: char) -> bool {
        self.form.type_char(c)
    }

    pub fn backspace(&mut self) {
        self.form.backspace();
    }

    /// Move field focus; with nothing focused, focus the first field.
    pub fn navigate(&mut self, direction: Direction) -> bool {
        if self.form.active().is_none() {
            self.form.activate_first();
            return true;
        }
        self.form.navigate(direction)
    }

    pub fn scroll_form(&mut self, steps: i32) {
        self.form.scroll_by(steps);
    }

    /// Focus the field drawn in the given editor slot.
    pub fn activate_slot(&mut self, slot: usize) -> bool {
        match self.form.key_at_slot(slot) {
            Some(key) => {
                self.form.activate(key);
                true
            }
            None => false,
        }
    }

    /// Confirm the active field. Completing the last field geolocates the
    /// selected target; a rejected value raises a notice.
    pub fn commit(&mut self, now: Instant) -> Result<CommitOutcome, FormError> {
        match self.form.commit() {
            Ok(CommitOutcome::Completed) => {
                self.estimate = EstimateState::Stale;
                info!("Telemetry entered: {:?}", self.form.telemetry());
                self.recompute_estimate();
                Ok(CommitOutcome::Completed)
            }
            Ok(outcome) => {
                self.estimate = EstimateState::Stale;
                Ok(outcome)
            }
            Err(e) => {
                self.show_notice(format!("Invalid value: {}", e), now);
                Err(e)
            }
        }
    }

    // ─── Estimation ─────────────────────────────────────────────────────

    /// Geolocate the selected target in the effective frame.
    pub fn recompute_estimate(&mut self) -> EstimateState {
        match self.modes.effective().cloned() {
            Some(delivery) => self.estimate_against(&delivery),
            None => {
                self.estimate = EstimateState::Unavailable(Unavailable::TargetNotVisible);
                self.estimate
            }
        }
    }

    fn estimate_against(&mut self, delivery: &Delivery) -> EstimateState {
        let Some(id) = self.tracks.selected() else {
            self.estimate = EstimateState::Stale;
            return self.estimate;
        };
        let result = match delivery.find(id) {
            Some(r) => geo::estimate(
                self.form.telemetry(),
                &self.fov,
                &r.bbox,
                delivery.frame.width(),
                delivery.frame.height(),
            ),
            None => Err(Unavailable::TargetNotVisible),
        };
        self.estimate = match result {
            Ok(est) => {
                info!(
                    "Target {}: {:.2} m at ({:.6}, {:.6}), pitch {:.2} deg, azimuth {:.2} deg",
                    id, est.distance_m, est.latitude, est.longitude, est.pitch_total_deg, est.azimuth_deg
                );
                EstimateState::Available(est)
            }
            Err(reason) => {
                info!("Target {}: no estimate ({})", id, reason);
                EstimateState::Unavailable(reason)
            }
        };
        self.estimate
    }

    // ─── Notices ────────────────────────────────────────────────────────

    pub fn show_notice(&mut self, text: impl Into<String>, now: Instant) {
        self.notice = Some(Notice {
            text: text.into(),
            expires_at: now + self.notice_duration,
        });
    }

    /// The current notice, if it hasn't expired by `now`.
    pub fn notice(&self, now: Instant) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| now < n.expires_at)
            .map(|n| n.text.as_str())
    }
}
