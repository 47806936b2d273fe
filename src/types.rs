use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

// ─── Geometry ───────────────────────────────────────────────────────────────

/// A point in frame pixel space. Sub-pixel precision is kept so that
/// velocity estimates aren't quantized by box rounding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned bounding box `(x1, y1, x2, y2)` in frame pixels.
/// Serializes as a 4-element array to match tracker output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box of the given size centered on `center`.
    pub fn around(center: Point, width: f32, height: f32) -> Self {
        Self {
            x1: center.x - width / 2.0,
            y1: center.y - height / 2.0,
            x2: center.x + width / 2.0,
            y2: center.y + height / 2.0,
        }
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).abs()
    }
}

impl From<[f32; 4]> for BBox {
    fn from(a: [f32; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

// ─── Tracker output ─────────────────────────────────────────────────────────

/// One tracked target in one frame, as produced by the upstream tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Stable identifier assigned by the tracker across frames.
    pub track_id: u64,
    pub bbox: BBox,
}

impl DetectionResult {
    pub fn new(track_id: u64, bbox: BBox) -> Self {
        Self { track_id, bbox }
    }
}

// ─── Frames ─────────────────────────────────────────────────────────────────

/// An immutable RGB8 frame (interleaved, row-major).
///
/// The pixel buffer is shared: cloning a frame to hold it as a snapshot
/// never copies pixels, and no holder can mutate it.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty { width, height });
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data: data.into(),
        })
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, FrameError> {
        let n = width as usize * height as usize;
        let mut data = Vec::with_capacity(n * 3);
        for _ in 0..n {
            data.extend_from_slice(&rgb);
        }
        Self::new(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True if both handles point at the same pixel buffer.
    pub fn same_buffer(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

// ─── Inter-thread messages ──────────────────────────────────────────────────

/// A queue item: one frame and the targets detected in it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub frame: Frame,
    pub results: Vec<DetectionResult>,
}

impl Delivery {
    pub fn new(frame: Frame, results: Vec<DetectionResult>) -> Self {
        Self { frame, results }
    }

    pub fn find(&self, track_id: u64) -> Option<&DetectionResult> {
        self.results.iter().find(|r| r.track_id == track_id)
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} targets={}",
            self.frame.width(),
            self.frame.height(),
            self.results.len()
        )
    }
}

// ─── Session clock ──────────────────────────────────────────────────────────

/// Monotonic clock for the overlay session.
#[derive(Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Constants ──────────────────────────────────────────────────────────────

/// Mean Earth radius used by the flat-earth destination approximation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Frame rate assumed when converting history capacity to a time window.
pub const NOMINAL_FPS: f64 = 30.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_buffer_size() {
        let err = Frame::new(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, FrameError::BufferSize { expected: 48, actual: 10 }));
        assert!(Frame::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn test_frame_clone_shares_pixels() {
        let a = Frame::solid(8, 6, [10, 20, 30]).unwrap();
        let b = a.clone();
        assert!(a.same_buffer(&b));
        assert_eq!(&b.data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_bbox_serializes_as_array() {
        let r = DetectionResult::new(7, BBox::new(1.0, 2.0, 3.0, 4.0));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"track_id":7,"bbox":[1.0,2.0,3.0,4.0]}"#);
        let back: DetectionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.bbox.center(), Point::new(2.0, 3.0));
    }
}
