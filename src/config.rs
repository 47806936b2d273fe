//! Tunable overlay settings.
//!
//! Every threshold and buffer size the overlay uses lives here so it can be
//! adjusted from a JSON file (`--config`) without touching code. Missing keys
//! fall back to the defaults below.

use crate::error::ConfigError;
use crate::geo::CameraFov;
use log::info;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Max click-to-center distance (px) for a click to select a target.
    pub select_radius_px: f32,
    /// Points kept per track for trail drawing.
    pub track_history_capacity: usize,
    /// Points kept for the selected target's trail-of-interest.
    pub selection_history_capacity: usize,
    /// Minimum interval between two triggers of the same global hotkey.
    pub key_cooldown_ms: u64,
    /// Width of the side panel appended to the right of the video.
    pub panel_width: u32,
    /// Telemetry rows visible at once in the stop-mode editor.
    pub visible_fields: usize,
    /// Background grid spacing (px).
    pub grid_spacing: u32,
    /// Bounded wait on the frame queue per loop iteration.
    pub poll_timeout_ms: u64,
    /// How long a validation notice stays on screen.
    pub notice_ms: u64,
    pub fov_horizontal_deg: f64,
    pub fov_vertical_deg: f64,
    /// Initial display toggles.
    pub show_trails: bool,
    pub show_grid: bool,
    pub show_info: bool,
    pub auto_freeze: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            select_radius_px: 100.0,
            track_history_capacity: 60,   // 2 s at 30 fps
            selection_history_capacity: 120, // 4 s at 30 fps
            key_cooldown_ms: 200,
            panel_width: 300,
            visible_fields: 3,
            grid_spacing: 50,
            poll_timeout_ms: 100,
            notice_ms: 2000,
            fov_horizontal_deg: 53.0,
            fov_vertical_deg: 42.0,
            show_trails: true,
            show_grid: true,
            show_info: true,
            auto_freeze: false,
        }
    }
}

impl OverlayConfig {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!("Loaded overlay config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)?;
        info!("Overlay config saved to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.track_history_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "track_history_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.selection_history_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "selection_history_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.visible_fields == 0 {
            return Err(ConfigError::Invalid {
                name: "visible_fields",
                reason: "must be at least 1".into(),
            });
        }
        if self.panel_width < 120 {
            return Err(ConfigError::Invalid {
                name: "panel_width",
                reason: format!("{} px is too narrow for the editor", self.panel_width),
            });
        }
        for (name, fov) in [
            ("fov_horizontal_deg", self.fov_horizontal_deg),
            ("fov_vertical_deg", self.fov_vertical_deg),
        ] {
            if !(fov > 0.0 && fov < 180.0) {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("{} is outside (0, 180)", fov),
                });
            }
        }
        Ok(())
    }

    pub fn fov(&self) -> CameraFov {
        CameraFov {
            horizontal_deg: self.fov_horizontal_deg,
            vertical_deg: self.fov_vertical_deg,
        }
    }

    pub fn key_cooldown(&self) -> Duration {
        Duration::from_millis(self.key_cooldown_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: OverlayConfig =
            serde_json::from_str(r#"{ "select_radius_px": 40.0, "visible_fields": 5 }"#).unwrap();
        assert_eq!(cfg.select_radius_px, 40.0);
        assert_eq!(cfg.visible_fields, 5);
        assert_eq!(cfg.track_history_capacity, 60);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let cfg = OverlayConfig {
            track_history_capacity: 0,
            ..OverlayConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { name: "track_history_capacity", .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("overlay-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("overlay.json");
        let cfg = OverlayConfig {
            auto_freeze: true,
            key_cooldown_ms: 350,
            ..OverlayConfig::default()
        };
        cfg.save(&path).unwrap();
        let loaded = OverlayConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
