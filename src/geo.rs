use crate::types::{BBox, EARTH_RADIUS_M};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latitudes beyond this are rejected: the longitude scale `1/cos(lat)`
/// blows up toward the poles and the flat-earth step stops meaning anything.
pub const MAX_ABS_LATITUDE_DEG: f64 = 89.0;

/// Drone state as entered by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DroneTelemetry {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    /// Heading of the camera axis: 0 = north, clockwise.
    pub compass_deg: f64,
    /// Downward tilt of the camera from horizontal.
    pub camera_pitch_deg: f64,
}

/// Fixed camera field of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraFov {
    pub horizontal_deg: f64,
    pub vertical_deg: f64,
}

impl Default for CameraFov {
    fn default() -> Self {
        Self {
            horizontal_deg: 53.0,
            vertical_deg: 42.0,
        }
    }
}

/// Ground position and range of a target, computed once per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetEstimate {
    pub distance_m: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Line-of-sight depression below horizontal, including the pixel offset.
    pub pitch_total_deg: f64,
    /// Bearing from the drone to the target, [0, 360).
    pub azimuth_deg: f64,
}

/// Why no estimate could be produced. None of these are faults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unavailable {
    /// Line of sight is at or above the horizon; it never meets the ground.
    AboveHorizon { pitch_total_deg: f64 },
    /// The selected target is not in the effective result set.
    TargetNotVisible,
    /// Drone latitude too close to a pole for the longitude approximation.
    PolarLatitude { latitude: f64 },
    /// Frame has no extent to measure an offset against.
    DegenerateFrame,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::AboveHorizon { pitch_total_deg } => {
                write!(f, "camera above horizon ({:.1} deg)", pitch_total_deg)
            }
            Unavailable::TargetNotVisible => write!(f, "target not in view"),
            Unavailable::PolarLatitude { latitude } => {
                write!(f, "latitude {:.3} out of range", latitude)
            }
            Unavailable::DegenerateFrame => write!(f, "empty frame"),
        }
    }
}

/// Back-project a target's bounding box onto flat ground.
///
/// The pixel offset of the box center from the frame center is turned into
/// angular offsets through the field of view, added to the camera's pitch and
/// compass, and the resulting ray is intersected with the ground plane at
/// `altitude_m` below the drone. The ground distance is then walked along the
/// azimuth with a small-distance spherical approximation.
pub fn estimate(
    telemetry: &DroneTelemetry,
    fov: &CameraFov,
    bbox: &BBox,
    frame_width: u32,
    frame_height: u32,
) -> Result<TargetEstimate, Unavailable> {
    if frame_width == 0 || frame_height == 0 {
        return Err(Unavailable::DegenerateFrame);
    }
    if telemetry.latitude.abs() > MAX_ABS_LATITUDE_DEG {
        return Err(Unavailable::PolarLatitude {
            latitude: telemetry.latitude,
        });
    }

    let w = frame_width as f64;
    let h = frame_height as f64;
    let center = bbox.center();
    let dx = center.x as f64 - w / 2.0;
    let dy = center.y as f64 - h / 2.0;

    let angle_h = dx / w * fov.horizontal_deg;
    let angle_v = dy / h * fov.vertical_deg;

    let pitch_total_deg = telemetry.camera_pitch_deg + angle_v;
    let mut azimuth_deg = telemetry.compass_deg + angle_h;

    // Past nadir the ray points back behind the drone: the depression below
    // the horizon is measured the other way and the bearing flips.
    let depression_deg = if pitch_total_deg > 90.0 {
        azimuth_deg += 180.0;
        180.0 - pitch_total_deg
    } else {
        pitch_total_deg
    };
    let azimuth_deg = azimuth_deg.rem_euclid(360.0);

    if depression_deg <= 0.0 {
        return Err(Unavailable::AboveHorizon { pitch_total_deg });
    }

    let distance_m = telemetry.altitude_m / depression_deg.to_radians().tan();

    let az = azimuth_deg.to_radians();
    let lat_rad = telemetry.latitude.to_radians();
    let delta_lat = distance_m * az.cos() / EARTH_RADIUS_M;
    let delta_lon = distance_m * az.sin() / (EARTH_RADIUS_M * lat_rad.cos());

    Ok(TargetEstimate {
        distance_m,
        latitude: telemetry.latitude + delta_lat.to_degrees(),
        longitude: telemetry.longitude + delta_lon.to_degrees(),
        pitch_total_deg,
        azimuth_deg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    const W: u32 = 640;
    const H: u32 = 480;

    fn centered_box() -> BBox {
        BBox::around(Point::new(W as f32 / 2.0, H as f32 / 2.0), 40.0, 40.0)
    }

    fn telemetry(alt: f64, compass: f64, pitch: f64) -> DroneTelemetry {
        DroneTelemetry {
            latitude: 0.0,
            longitude: 0.0,
            altitude_m: alt,
            compass_deg: compass,
            camera_pitch_deg: pitch,
        }
    }

    #[test]
    fn test_45_degrees_distance_equals_altitude() {
        let est = estimate(&telemetry(100.0, 0.0, 45.0), &CameraFov::default(), &centered_box(), W, H)
            .unwrap();
        assert!((est.distance_m - 100.0).abs() < 1e-9, "distance={}", est.distance_m);
        assert!((est.pitch_total_deg - 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_horizon_and_above_is_unavailable() {
        let fov = CameraFov::default();
        for pitch in [0.0, -5.0, -90.0] {
            let r = estimate(&telemetry(100.0, 0.0, pitch), &fov, &centered_box(), W, H);
            assert!(matches!(r, Err(Unavailable::AboveHorizon { .. })), "pitch {}", pitch);
        }
        // Target in the upper part of the frame pushes a shallow pitch above horizon.
        let high = BBox::around(Point::new(320.0, 10.0), 10.0, 10.0);
        let r = estimate(&telemetry(100.0, 0.0, 5.0), &fov, &high, W, H);
        assert!(matches!(r, Err(Unavailable::AboveHorizon { pitch_total_deg }) if pitch_total_deg < 0.0));
    }

    #[test]
    fn test_small_positive_pitch_gives_finite_distance() {
        let r = estimate(&telemetry(50.0, 0.0, 0.5), &CameraFov::default(), &centered_box(), W, H)
            .unwrap();
        assert!(r.distance_m.is_finite() && r.distance_m > 0.0);
    }

    #[test]
    fn test_north_bearing_moves_latitude_only() {
        let est = estimate(&telemetry(100.0, 0.0, 45.0), &CameraFov::default(), &centered_box(), W, H)
            .unwrap();
        // 100 m north is ~0.000899 degrees of latitude.
        let expected = (100.0 / EARTH_RADIUS_M).to_degrees();
        assert!((est.latitude - expected).abs() < 1e-9);
        assert!(est.longitude.abs() < 1e-12);
    }

    #[test]
    fn test_east_bearing_moves_longitude() {
        let est = estimate(&telemetry(100.0, 90.0, 45.0), &CameraFov::default(), &centered_box(), W, H)
            .unwrap();
        assert!((est.azimuth_deg - 90.0).abs() < 1e-9);
        assert!(est.latitude.abs() < 1e-9);
        assert!(est.longitude > 0.0);
    }

    #[test]
    fn test_azimuth_wraps_into_range() {
        // Target at the left edge with compass 10 deg: 10 - 26.5 wraps to 343.5.
        let left = BBox::around(Point::new(0.0, H as f32 / 2.0), 4.0, 4.0);
        let est = estimate(&telemetry(100.0, 10.0, 45.0), &CameraFov::default(), &left, W, H).unwrap();
        assert!((est.azimuth_deg - 343.5).abs() < 1e-6, "azimuth={}", est.azimuth_deg);
    }

    #[test]
    fn test_past_nadir_looks_behind() {
        // Nadir camera, target at the bottom edge: 90 + 21 = 111 deg.
        let low = BBox::around(Point::new(W as f32 / 2.0, H as f32), 4.0, 4.0);
        let est = estimate(&telemetry(100.0, 0.0, 90.0), &CameraFov::default(), &low, W, H).unwrap();
        assert!((est.pitch_total_deg - 111.0).abs() < 1e-9);
        let expected = 100.0 / 69f64.to_radians().tan();
        assert!((est.distance_m - expected).abs() < 1e-9, "distance={}", est.distance_m);
        assert!(est.distance_m > 0.0);
        assert!((est.azimuth_deg - 180.0).abs() < 1e-9, "azimuth={}", est.azimuth_deg);
        assert!(est.latitude < 0.0, "south of a north-facing drone");
    }

    #[test]
    fn test_nadir_center_is_directly_below() {
        let est = estimate(&telemetry(100.0, 0.0, 90.0), &CameraFov::default(), &centered_box(), W, H)
            .unwrap();
        assert!(est.distance_m >= 0.0 && est.distance_m < 1e-6);
    }

    #[test]
    fn test_polar_latitude_rejected() {
        let mut t = telemetry(100.0, 0.0, 45.0);
        t.latitude = 89.5;
        let r = estimate(&t, &CameraFov::default(), &centered_box(), W, H);
        assert_eq!(r, Err(Unavailable::PolarLatitude { latitude: 89.5 }));
    }

    #[test]
    fn test_degenerate_frame() {
        let r = estimate(&telemetry(100.0, 0.0, 45.0), &CameraFov::default(), &centered_box(), 0, H);
        assert_eq!(r, Err(Unavailable::DegenerateFrame));
    }
}
