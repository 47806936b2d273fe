use crate::error::ModeError;
use crate::types::Delivery;
use log::{debug, info};

/// Which pair is authoritative for rendering and hit-testing.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Every delivery is shown as it arrives.
    Live,
    /// Targets were lost with auto-freeze on; `held` is shown until they return.
    AutoFrozen { held: Delivery },
    /// Operator pause; `held` is shown and deliveries are ignored.
    Stopped { held: Delivery },
}

/// Mode without the held data, for status display and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Live,
    AutoFrozen,
    Stopped,
}

/// What a delivery did to the effective pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// The delivery is now the effective pair.
    Shown,
    /// Entered AutoFrozen; the held snapshot is effective.
    Froze,
    /// Still frozen; nothing changed.
    HeldFrozen,
    /// Stopped; the delivery was ignored.
    Ignored,
}

/// Result of the stop toggle.
#[derive(Debug, Clone)]
pub enum StopToggle {
    Entered,
    /// Left Stopped; carries the snapshot that was effective until now.
    Exited { snapshot: Delivery },
}

/// Live / AutoFrozen / Stopped state machine.
///
/// Every method leaves the controller in exactly one mode; a refused
/// transition changes nothing.
pub struct FrameModeController {
    mode: Mode,
    auto_freeze: bool,
    /// Most recent delivery, effective while Live.
    latest: Option<Delivery>,
}

impl FrameModeController {
    pub fn new() -> Self {
        Self {
            mode: Mode::Live,
            auto_freeze: false,
            latest: None,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn kind(&self) -> ModeKind {
        match self.mode {
            Mode::Live => ModeKind::Live,
            Mode::AutoFrozen { .. } => ModeKind::AutoFrozen,
            Mode::Stopped { .. } => ModeKind::Stopped,
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.mode, Mode::Stopped { .. })
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.mode, Mode::AutoFrozen { .. })
    }

    pub fn auto_freeze(&self) -> bool {
        self.auto_freeze
    }

    /// The pair currently authoritative for rendering and hit-testing.
    pub fn effective(&self) -> Option<&Delivery> {
        match &self.mode {
            Mode::Live => self.latest.as_ref(),
            Mode::AutoFrozen { held } | Mode::Stopped { held } => Some(held),
        }
    }

    /// Apply a queue delivery.
    pub fn ingest(&mut self, delivery: Delivery) -> Ingest {
        if self.is_stopped() {
            return Ingest::Ignored;
        }

        let has_targets = !delivery.results.is_empty();

        let outcome = match (self.kind(), has_targets) {
            (ModeKind::AutoFrozen, true) => {
                info!("Targets reacquired, resuming live view");
                self.mode = Mode::Live;
                Ingest::Shown
            }
            (ModeKind::AutoFrozen, false) => Ingest::HeldFrozen,
            (ModeKind::Live, false) if self.auto_freeze => {
                // The frame current at the moment of loss is held, with no targets.
                info!("Targets lost, freezing frame");
                self.mode = Mode::AutoFrozen {
                    held: Delivery::new(delivery.frame.clone(), Vec::new()),
                };
                Ingest::Froze
            }
            _ => Ingest::Shown,
        };

        self.latest = Some(delivery);
        outcome
    }

    /// Flip auto-freeze. Turning it off while frozen resumes Live at once.
    pub fn toggle_auto_freeze(&mut self) -> bool {
        self.set_auto_freeze(!self.auto_freeze);
        self.auto_freeze
    }

    pub fn set_auto_freeze(&mut self, enabled: bool) {
        self.auto_freeze = enabled;
        if !enabled && self.is_frozen() {
            debug!("auto-freeze disabled while frozen, back to live");
            self.mode = Mode::Live;
        }
    }

    /// Enter or leave Stopped.
    ///
    /// Entering snapshots the effective pair and fails with
    /// [`ModeError::NoFrame`] if there is none. Leaving resumes Live with the
    /// last delivered pair and hands the snapshot back.
    pub fn toggle_stop(&mut self) -> Result<StopToggle, ModeError> {
        match std::mem::replace(&mut self.mode, Mode::Live) {
            Mode::Stopped { held } => Ok(StopToggle::Exited { snapshot: held }),
            Mode::AutoFrozen { held } => {
                self.mode = Mode::Stopped { held };
                Ok(StopToggle::Entered)
            }
            Mode::Live => match self.latest.clone() {
                Some(held) => {
                    self.mode = Mode::Stopped { held };
                    Ok(StopToggle::Entered)
                }
                None => Err(ModeError::NoFrame),
            },
        }
    }
}

impl Default for FrameModeController {
    fn default() -> Self {
        Self::new()
    }
}
