//! Where composites go and where operator input comes from.

use crate::error::SurfaceError;
use crate::input::InputEvent;
use crate::overlay::OverlayStatus;
use image::RgbImage;
use log::debug;

pub trait Surface {
    /// Show one composite.
    fn present(&mut self, image: &RgbImage, status: &OverlayStatus) -> Result<(), SurfaceError>;

    /// Input gathered since the last call.
    fn poll_events(&mut self) -> Vec<InputEvent>;

    fn is_open(&self) -> bool;
}

/// Surface with no output and no input, for unattended runs.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    presented: u64,
    last_size: Option<(u32, u32)>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.last_size
    }
}

impl Surface for HeadlessSurface {
    fn present(&mut self, image: &RgbImage, status: &OverlayStatus) -> Result<(), SurfaceError> {
        self.presented += 1;
        self.last_size = Some(image.dimensions());
        if self.presented % 300 == 0 {
            debug!("headless: {} composites, {}", self.presented, status);
        }
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }

    fn is_open(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_mode::ModeKind;
    use crate::overlay::EstimateState;

    #[test]
    fn test_headless_counts_presents() {
        let mut s = HeadlessSurface::new();
        let status = OverlayStatus {
            mode: ModeKind::Live,
            auto_freeze: false,
            target_count: 0,
            selected: None,
            estimate: EstimateState::Stale,
            recording: false,
        };
        s.present(&RgbImage::new(12, 8), &status).unwrap();
        assert_eq!(s.presented(), 1);
        assert_eq!(s.last_size(), Some((12, 8)));
        assert!(s.poll_events().is_empty());
        assert!(s.is_open());
    }
}
