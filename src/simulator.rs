use crate::error::FrameError;
use crate::types::*;
use crossbeam_channel::{SendTimeoutError, Sender};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Generates synthetic tracker output (frames plus moving targets) that
/// exercises the overlay without a camera or detector.
pub struct Simulator {
    tx: Sender<Delivery>,
    shutdown: Arc<AtomicBool>,
    width: u32,
    height: u32,
    fps: f64,
    /// Sleep between deliveries to hold `fps`. Off for tests.
    paced: bool,
    frame_index: u64,
}

/// A synthetic target moving in a straight line, bouncing off frame edges.
#[derive(Debug, Clone, Copy)]
pub struct SimTarget {
    pub track_id: u64,
    pub position: Point,
    /// Pixels per second.
    pub velocity: (f32, f32),
    pub size: (f32, f32),
}

/// One step of a scripted scenario.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Targets are visible and move for `ms`.
    Track { ms: u64 },
    /// The tracker loses every target for `ms`; frames keep coming.
    Lost { ms: u64 },
    /// A new target enters.
    Spawn(SimTarget),
    /// Target leaves for good.
    Remove { track_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl Simulator {
    pub fn new(
        tx: Sender<Delivery>,
        shutdown: Arc<AtomicBool>,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Self {
        Self {
            tx,
            shutdown,
            width,
            height,
            fps: if fps > 0.0 { fps } else { NOMINAL_FPS },
            paced: true,
            frame_index: 0,
        }
    }

    pub fn with_pacing(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Loop the demo scenario until shutdown or until the consumer goes away.
    /// Blocks the calling thread.
    pub fn run(&mut self) {
        info!(
            "Simulator starting: {}x{} @ {:.0} fps",
            self.width, self.height, self.fps
        );
        let script = demo_script(self.width, self.height);
        let mut pass = 0u64;
        while self.run_script(&script) == Flow::Continue {
            pass += 1;
            info!("Demo scenario pass {} complete, restarting", pass);
        }
        info!("Simulator stopped after {} frames", self.frame_index);
    }

    /// Play `script` once. Returns how many frames were delivered.
    pub fn play(&mut self, script: &[Segment]) -> u64 {
        let before = self.frame_index;
        self.run_script(script);
        self.frame_index - before
    }

    fn run_script(&mut self, script: &[Segment]) -> Flow {
        let mut targets: Vec<SimTarget> = Vec::new();
        for segment in script {
            let flow = match segment {
                Segment::Track { ms } => {
                    info!("  tracking {} target(s) for {}ms", targets.len(), ms);
                    self.emit_for(*ms, &mut targets, true)
                }
                Segment::Lost { ms } => {
                    info!("  targets lost for {}ms", ms);
                    self.emit_for(*ms, &mut targets, false)
                }
                Segment::Spawn(t) => {
                    info!("  target {} enters at ({:.0}, {:.0})", t.track_id, t.position.x, t.position.y);
                    targets.push(*t);
                    Flow::Continue
                }
                Segment::Remove { track_id } => {
                    info!("  target {} leaves", track_id);
                    targets.retain(|t| t.track_id != *track_id);
                    Flow::Continue
                }
            };
            if flow == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn emit_for(&mut self, ms: u64, targets: &mut [SimTarget], visible: bool) -> Flow {
        let dt = 1.0 / self.fps;
        let ticks = ((ms as f64 / 1000.0) * self.fps).round().max(1.0) as u64;
        for _ in 0..ticks {
            for t in targets.iter_mut() {
                step(t, dt as f32, self.width as f32, self.height as f32);
            }
            let results: Vec<DetectionResult> = if visible {
                targets
                    .iter()
                    .map(|t| DetectionResult::new(t.track_id, BBox::around(t.position, t.size.0, t.size.1)))
                    .collect()
            } else {
                Vec::new()
            };
            // Targets are drawn even while "lost": the detector missed them,
            // they did not vanish from the scene.
            let scene: Vec<DetectionResult> = targets
                .iter()
                .map(|t| DetectionResult::new(t.track_id, BBox::around(t.position, t.size.0, t.size.1)))
                .collect();
            let frame = match render_scene(self.width, self.height, &scene, self.frame_index) {
                Ok(f) => f,
                Err(e) => {
                    warn!("Simulator cannot build frames: {}", e);
                    return Flow::Stop;
                }
            };
            if self.send(Delivery::new(frame, results)) == Flow::Stop {
                return Flow::Stop;
            }
            self.frame_index += 1;
            if self.paced {
                thread::sleep(Duration::from_secs_f64(dt));
            }
        }
        Flow::Continue
    }

    /// Blocking send that still notices shutdown and a departed consumer.
    fn send(&self, mut delivery: Delivery) -> Flow {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Flow::Stop;
            }
            match self.tx.send_timeout(delivery, Duration::from_millis(100)) {
                Ok(()) => return Flow::Continue,
                Err(SendTimeoutError::Timeout(d)) => delivery = d,
                Err(SendTimeoutError::Disconnected(_)) => return Flow::Stop,
            }
        }
    }
}

fn step(t: &mut SimTarget, dt: f32, width: f32, height: f32) {
    let (hw, hh) = (t.size.0 / 2.0, t.size.1 / 2.0);
    t.position.x += t.velocity.0 * dt;
    t.position.y += t.velocity.1 * dt;
    if t.position.x < hw || t.position.x > width - hw {
        t.velocity.0 = -t.velocity.0;
        t.position.x = t.position.x.clamp(hw, (width - hw).max(hw));
    }
    if t.position.y < hh || t.position.y > height - hh {
        t.velocity.1 = -t.velocity.1;
        t.position.y = t.position.y.clamp(hh, (height - hh).max(hh));
    }
}

/// A dark textured background with a light blob per target.
pub fn render_scene(
    width: u32,
    height: u32,
    targets: &[DetectionResult],
    frame_index: u64,
) -> Result<Frame, FrameError> {
    let (w, h) = (width as usize, height as usize);
    let mut data = vec![0u8; w * h * 3];
    let drift = (frame_index % 64) as usize;
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 3;
            let shade = 30 + (((x + drift) / 16 + y / 16) % 2) as u8 * 8;
            data[i] = shade;
            data[i + 1] = shade + 10;
            data[i + 2] = shade;
        }
    }
    for t in targets {
        let b = t.bbox;
        let x1 = b.x1.max(0.0) as usize;
        let y1 = b.y1.max(0.0) as usize;
        let x2 = (b.x2.max(0.0) as usize).min(w);
        let y2 = (b.y2.max(0.0) as usize).min(h);
        for y in y1..y2 {
            for x in x1..x2 {
                let i = (y * w + x) * 3;
                data[i..i + 3].copy_from_slice(&[190, 180, 160]);
            }
        }
    }
    Frame::new(width, height, data)
}

/// The built-in scenario: two targets cross the frame, the tracker loses
/// them for a second (auto-freeze), they come back, one leaves.
pub fn demo_script(width: u32, height: u32) -> Vec<Segment> {
    let (w, h) = (width as f32, height as f32);
    vec![
        Segment::Spawn(SimTarget {
            track_id: 1,
            position: Point::new(w * 0.2, h * 0.5),
            velocity: (60.0, 15.0),
            size: (40.0, 30.0),
        }),
        Segment::Spawn(SimTarget {
            track_id: 2,
            position: Point::new(w * 0.7, h * 0.3),
            velocity: (-35.0, 40.0),
            size: (30.0, 30.0),
        }),
        Segment::Track { ms: 4000 },
        Segment::Lost { ms: 1000 },
        Segment::Track { ms: 3000 },
        Segment::Spawn(SimTarget {
            track_id: 3,
            position: Point::new(w * 0.5, h * 0.8),
            velocity: (20.0, -50.0),
            size: (24.0, 24.0),
        }),
        Segment::Track { ms: 3000 },
        Segment::Remove { track_id: 1 },
        Segment::Track { ms: 3000 },
        Segment::Remove { track_id: 2 },
        Segment::Remove { track_id: 3 },
        Segment::Lost { ms: 1000 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn simulator(capacity: usize) -> (Simulator, crossbeam_channel::Receiver<Delivery>, Arc<AtomicBool>) {
        let (tx, rx) = bounded(capacity);
        let shutdown = Arc::new(AtomicBool::new(false));
        let sim = Simulator::new(tx, shutdown.clone(), 64, 48, 10.0).with_pacing(false);
        (sim, rx, shutdown)
    }

    fn target(id: u64) -> SimTarget {
        SimTarget {
            track_id: id,
            position: Point::new(20.0, 20.0),
            velocity: (10.0, 0.0),
            size: (8.0, 8.0),
        }
    }

    #[test]
    fn test_lost_segment_sends_empty_results() {
        let (mut sim, rx, _) = simulator(64);
        let sent = sim.play(&[
            Segment::Spawn(target(1)),
            Segment::Track { ms: 500 },
            Segment::Lost { ms: 300 },
        ]);
        assert_eq!(sent, 8);
        let all: Vec<Delivery> = rx.try_iter().collect();
        assert!(all[..5].iter().all(|d| d.results.len() == 1));
        assert!(all[5..].iter().all(|d| d.results.is_empty()));
        assert_eq!(all[0].frame.width(), 64);
    }

    #[test]
    fn test_targets_move_and_bounce() {
        let mut t = SimTarget {
            velocity: (100.0, 0.0),
            ..target(1)
        };
        step(&mut t, 1.0, 64.0, 48.0);
        assert_eq!(t.position.x, 60.0);
        assert!(t.velocity.0 < 0.0, "bounced off right edge");
    }

    #[test]
    fn test_stops_when_consumer_leaves() {
        let (mut sim, rx, _) = simulator(1);
        drop(rx);
        let sent = sim.play(&[Segment::Spawn(target(1)), Segment::Track { ms: 10_000 }]);
        assert_eq!(sent, 0);
    }

    #[test]
    fn test_stops_on_shutdown_when_queue_full() {
        let (mut sim, rx, shutdown) = simulator(2);
        shutdown.store(true, Ordering::Relaxed);
        let sent = sim.play(&[Segment::Track { ms: 10_000 }]);
        assert_eq!(sent, 0);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_scene_draws_targets() {
        let r = DetectionResult::new(1, BBox::new(10.0, 10.0, 20.0, 20.0));
        let frame = render_scene(32, 32, &[r], 0).unwrap();
        let i = (15 * 32 + 15) * 3;
        assert_eq!(&frame.data()[i..i + 3], &[190, 180, 160]);
        assert_ne!(&frame.data()[..3], &[190, 180, 160]);
    }
}
