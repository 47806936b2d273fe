use crate::types::{DetectionResult, Point, NOMINAL_FPS};
use log::trace;
use std::collections::{HashMap, VecDeque};

/// Weight of the previous value in speed smoothing.
const SPEED_KEEP: f64 = 0.7;
/// Fraction of the shortest angular delta applied per heading update.
const HEADING_GAIN: f64 = 0.3;

/// Smoothed motion of one track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityState {
    /// Pixels per second, smoothed. None until two samples were seen.
    pub speed: Option<f64>,
    /// Image-space heading in degrees, [0, 360): 0 = +x, 90 = +y (down).
    pub heading_deg: Option<f64>,
    pub last_position: Point,
    pub last_timestamp: f64,
}

/// Bounded FIFO of recent centers for one track.
#[derive(Debug, Clone)]
struct TrackHistory {
    points: VecDeque<Point>,
    last_seen: f64,
}

/// Signed shortest rotation from `from` to `to`, in [-180, 180).
pub fn shortest_angle_delta(from: f64, to: f64) -> f64 {
    (to - from + 180.0).rem_euclid(360.0) - 180.0
}

/// Blend `old` toward `new` along the short way round.
pub fn blend_heading(old: f64, new: f64) -> f64 {
    (old + shortest_angle_delta(old, new) * HEADING_GAIN).rem_euclid(360.0)
}

/// Per-track position history and motion estimates, plus the current
/// target selection and its trail-of-interest.
///
/// Histories are created on first sighting and never removed; each is
/// capacity-bounded, and a track that hasn't been seen for longer than its
/// history window is treated as stale.
pub struct TrackStore {
    history: HashMap<u64, TrackHistory>,
    velocity: HashMap<u64, VelocityState>,
    history_capacity: usize,
    selected: Option<u64>,
    selection_history: VecDeque<Point>,
    selection_capacity: usize,
}

impl TrackStore {
    pub fn new(history_capacity: usize, selection_capacity: usize) -> Self {
        Self {
            history: HashMap::new(),
            velocity: HashMap::new(),
            history_capacity: history_capacity.max(1),
            selected: None,
            selection_history: VecDeque::with_capacity(selection_capacity.max(1)),
            selection_capacity: selection_capacity.max(1),
        }
    }

    /// Record one effective frame's results taken at `timestamp` (seconds).
    pub fn observe(&mut self, results: &[DetectionResult], timestamp: f64) {
        for result in results {
            let id = result.track_id;
            let center = result.bbox.center();

            match self.velocity.get_mut(&id) {
                Some(state) => {
                    let dt = timestamp - state.last_timestamp;
                    if dt > 0.0 {
                        update_motion(state, center, dt);
                    }
                    state.last_position = center;
                    state.last_timestamp = timestamp;
                }
                None => {
                    self.velocity.insert(
                        id,
                        VelocityState {
                            speed: None,
                            heading_deg: None,
                            last_position: center,
                            last_timestamp: timestamp,
                        },
                    );
                }
            }

            let capacity = self.history_capacity;
            let history = self.history.entry(id).or_insert_with(|| TrackHistory {
                points: VecDeque::with_capacity(capacity),
                last_seen: timestamp,
            });
            if history.points.len() == capacity {
                history.points.pop_front();
            }
            history.points.push_back(center);
            history.last_seen = timestamp;

            if self.selected == Some(id) {
                if self.selection_history.len() == self.selection_capacity {
                    self.selection_history.pop_front();
                }
                self.selection_history.push_back(center);
            }
        }
    }

    /// Set or clear the selected target. The trail-of-interest restarts.
    /// Returns whether the selection changed.
    pub fn select(&mut self, track_id: Option<u64>) -> bool {
        let changed = self.selected != track_id;
        self.selected = track_id;
        self.selection_history.clear();
        changed
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn trail(&self, track_id: u64) -> Option<&VecDeque<Point>> {
        self.history.get(&track_id).map(|h| &h.points)
    }

    pub fn selection_trail(&self) -> &VecDeque<Point> {
        &self.selection_history
    }

    pub fn velocity(&self, track_id: u64) -> Option<&VelocityState> {
        self.velocity.get(&track_id)
    }

    /// Time span covered by a full history buffer.
    pub fn history_window_secs(&self) -> f64 {
        self.history_capacity as f64 / NOMINAL_FPS
    }

    /// A track is stale once unseen for longer than its history window.
    /// Unknown tracks are stale.
    pub fn is_stale(&self, track_id: u64, now: f64) -> bool {
        match self.history.get(&track_id) {
            Some(h) => now - h.last_seen > self.history_window_secs(),
            None => true,
        }
    }

    pub fn track_count(&self) -> usize {
        self.history.len()
    }
}

fn update_motion(state: &mut VelocityState, center: Point, dt: f64) {
    let dx = (center.x - state.last_position.x) as f64;
    let dy = (center.y - state.last_position.y) as f64;
    let distance = (dx * dx + dy * dy).sqrt();
    let raw_speed = distance / dt;

    state.speed = Some(match state.speed {
        Some(old) => SPEED_KEEP * old + (1.0 - SPEED_KEEP) * raw_speed,
        None => raw_speed,
    });

    // A stationary sample carries no direction; keep the last heading.
    if distance > f64::EPSILON {
        let raw_heading = dy.atan2(dx).to_degrees().rem_euclid(360.0);
        state.heading_deg = Some(match state.heading_deg {
            Some(old) => blend_heading(old, raw_heading),
            None => raw_heading,
        });
    }
    trace!("motion: speed={:?} heading={:?}", state.speed, state.heading_deg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;

    fn at(id: u64, x: f32, y: f32) -> DetectionResult {
        DetectionResult::new(id, BBox::around(Point::new(x, y), 20.0, 20.0))
    }

    #[test]
    fn test_heading_blend_takes_short_path() {
        let blended = blend_heading(350.0, 10.0);
        // 20 deg clockwise turn at gain 0.3 → 356.
        assert!((blended - 356.0).abs() < 1e-9, "blended={}", blended);
        let unwrapped = if blended < 180.0 { blended + 360.0 } else { blended };
        assert!(unwrapped > 350.0 && unwrapped < 370.0);

        let back = blend_heading(10.0, 350.0);
        assert!((back - 4.0).abs() < 1e-9, "back={}", back);
    }

    #[test]
    fn test_shortest_delta_range() {
        assert_eq!(shortest_angle_delta(350.0, 10.0), 20.0);
        assert_eq!(shortest_angle_delta(10.0, 350.0), -20.0);
        assert_eq!(shortest_angle_delta(0.0, 180.0), -180.0);
        assert_eq!(shortest_angle_delta(90.0, 90.0), 0.0);
    }

    #[test]
    fn test_history_is_capacity_bounded() {
        let mut store = TrackStore::new(5, 10);
        for i in 0..12 {
            store.observe(&[at(1, i as f32, 0.0)], i as f64 * 0.1);
        }
        let trail = store.trail(1).unwrap();
        assert_eq!(trail.len(), 5);
        assert_eq!(trail.front().unwrap().x, 7.0, "oldest evicted first");
        assert_eq!(trail.back().unwrap().x, 11.0);
    }

    #[test]
    fn test_speed_smoothing() {
        let mut store = TrackStore::new(10, 10);
        store.observe(&[at(1, 0.0, 0.0)], 0.0);
        assert_eq!(store.velocity(1).unwrap().speed, None);
        store.observe(&[at(1, 10.0, 0.0)], 1.0);
        assert_eq!(store.velocity(1).unwrap().speed, Some(10.0));
        store.observe(&[at(1, 30.0, 0.0)], 2.0);
        // 0.7 * 10 + 0.3 * 20
        let speed = store.velocity(1).unwrap().speed.unwrap();
        assert!((speed - 13.0).abs() < 1e-9);
        assert_eq!(store.velocity(1).unwrap().heading_deg, Some(0.0));
    }

    #[test]
    fn test_zero_dt_skips_motion_update() {
        let mut store = TrackStore::new(10, 10);
        store.observe(&[at(1, 0.0, 0.0)], 1.0);
        store.observe(&[at(1, 50.0, 0.0)], 1.0);
        let v = store.velocity(1).unwrap();
        assert_eq!(v.speed, None);
        assert_eq!(v.last_position.x, 50.0);
    }

    #[test]
    fn test_stationary_target_keeps_heading() {
        let mut store = TrackStore::new(10, 10);
        store.observe(&[at(1, 0.0, 0.0)], 0.0);
        store.observe(&[at(1, 0.0, 10.0)], 0.1);
        let heading = store.velocity(1).unwrap().heading_deg.unwrap();
        assert!((heading - 90.0).abs() < 1e-9, "moving down is 90 deg in image space");
        store.observe(&[at(1, 0.0, 10.0)], 0.2);
        assert_eq!(store.velocity(1).unwrap().heading_deg, Some(heading));
        assert_eq!(store.velocity(1).unwrap().speed.map(|s| s < 100.0), Some(true));
    }

    #[test]
    fn test_selection_history_only_tracks_selected() {
        let mut store = TrackStore::new(10, 3);
        assert!(store.select(Some(2)));
        for i in 0..5 {
            store.observe(&[at(1, 0.0, 0.0), at(2, i as f32, 0.0)], i as f64);
        }
        let trail: Vec<f32> = store.selection_trail().iter().map(|p| p.x).collect();
        assert_eq!(trail, vec![2.0, 3.0, 4.0]);

        assert!(store.select(Some(1)));
        assert!(store.selection_trail().is_empty());
        assert!(!store.select(Some(1)));
    }

    #[test]
    fn test_staleness_window() {
        let mut store = TrackStore::new(30, 10); // 1 s at 30 fps
        store.observe(&[at(4, 0.0, 0.0)], 10.0);
        assert!(!store.is_stale(4, 10.5));
        assert!(store.is_stale(4, 11.5));
        assert!(store.is_stale(99, 10.0));
        assert_eq!(store.track_count(), 1);
    }
}
